//! Submission of draw-list entries to the device

use crate::pipeline::draw_list::DrawListEntry;
use crate::render::{DrawCall, GraphicsDevice, FrameUniforms, Material, RenderState, ShaderId, UniformBinder};
use crate::scene::{Scene, Submesh};

/// Draw every submesh of `entries` in order
///
/// `state_for` picks the render state of each submesh. Device errors are
/// logged and the draw is skipped. Returns the number of draws issued.
pub(crate) fn submit_entries(
    device: &mut dyn GraphicsDevice,
    scene: &Scene,
    entries: &[DrawListEntry],
    frame: &FrameUniforms<'_>,
    binder: &mut UniformBinder,
    state_for: impl Fn(&Material, &Submesh) -> RenderState,
) -> usize {
    let clip_plane = frame.clip_plane.into();
    let mut draws = 0;

    for entry in entries {
        let Some(entity) = scene.entity(entry.entity) else {
            log::warn!("Draw list references removed entity {:?}", entry.entity);
            continue;
        };

        for &index in &entry.submeshes {
            let Some(submesh) = entity.mesh().submeshes.get(index) else {
                continue;
            };
            let Some(material) = scene.materials.get(submesh.material) else {
                continue;
            };

            let state = state_for(material, submesh);
            if state.shader == ShaderId::NULL {
                continue;
            }

            let uniforms = binder.bind(material, frame, entity.world_matrix(), entity.skeleton.as_deref());
            let call = DrawCall {
                mesh: entity.mesh().handle,
                submesh: index,
                state,
                uniforms,
                clip_plane,
            };
            match device.draw_submesh(&call) {
                Ok(()) => {
                    log::trace!("Drew {:?} submesh {index} key {}", entry.entity, entry.key);
                    draws += 1;
                }
                Err(e) => log::warn!("Skipped draw of {:?} submesh {index}: {e}", entry.entity),
            }
        }
    }

    draws
}
