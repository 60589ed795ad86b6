//! Bounding volumes and frustum planes
//!
//! Spheres are the culling primitive; AABBs are what meshes report and are
//! converted to spheres lazily when they change.

use crate::foundation::math::{Vec3, Vec4, Mat4, Point3};

/// Axis-Aligned Bounding Box in mesh-local space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl AABB {
    /// Create a new AABB from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with given half extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the AABB
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// True if the box has zero size along every axis
    pub fn is_degenerate(&self) -> bool {
        let size = self.max - self.min;
        !(size.x > 0.0 || size.y > 0.0 || size.z > 0.0)
    }

    /// Smallest box containing both boxes
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }
}

/// Bounding sphere
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    /// Sphere centre
    pub centre: Vec3,
    /// Sphere radius
    pub radius: f32,
}

impl BoundingSphere {
    /// Create a new sphere
    pub fn new(centre: Vec3, radius: f32) -> Self {
        Self { centre, radius }
    }

    /// Sphere enclosing an AABB
    pub fn from_aabb(aabb: &AABB) -> Self {
        Self {
            centre: aabb.center(),
            radius: aabb.extents().magnitude(),
        }
    }

    /// Transform a local sphere into world space
    ///
    /// The centre is transformed by the full world matrix; the radius is
    /// scaled by the mean axis scale and then by `inflation`.
    pub fn to_world(&self, world: &Mat4, mean_scale: f32, inflation: f32) -> Self {
        let centre = world.transform_point(&Point3::from(self.centre)).coords;
        Self {
            centre,
            radius: self.radius * mean_scale * inflation,
        }
    }
}

/// Result of classifying a volume against a plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Planar {
    /// Entirely on the side the normal points to
    Front,
    /// Entirely on the opposite side
    Back,
    /// Straddles the plane
    Intersection,
}

/// Plane defined by normal and distance from origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Normal vector (normalized)
    pub normal: Vec3,
    /// Distance from origin along the normal
    pub distance: f32,
}

impl Plane {
    /// Create a new plane from normal and distance
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal: normal.normalize(), distance }
    }

    /// Create a plane from raw `ax + by + cz + d` coefficients, normalizing them
    pub fn from_coefficients(coefficients: Vec4) -> Self {
        let normal = coefficients.xyz();
        let length = normal.magnitude();
        if length <= f32::EPSILON {
            return Self { normal: Vec3::zeros(), distance: coefficients.w };
        }
        Self {
            normal: normal / length,
            distance: coefficients.w / length,
        }
    }

    /// Calculate signed distance from plane to point
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(&point) + self.distance
    }

    /// Classify a sphere against this plane
    pub fn classify_sphere(&self, sphere: &BoundingSphere) -> Planar {
        let distance = self.distance_to_point(sphere.centre);
        if distance.abs() <= sphere.radius {
            Planar::Intersection
        } else if distance > 0.0 {
            Planar::Front
        } else {
            Planar::Back
        }
    }
}

/// Frustum for visibility culling
#[derive(Debug, Clone, PartialEq)]
pub struct Frustum {
    /// Six inward-facing planes (left, right, bottom, top, near, far)
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Create a frustum from six planes
    pub fn new(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// Extract frustum planes from a view-projection matrix
    ///
    /// Gribb-Hartmann extraction for clip-space depth in [-1, 1]. Plane
    /// normals point into the frustum.
    pub fn from_matrix(vp_matrix: &Mat4) -> Self {
        let row = |i: usize| -> Vec4 { vp_matrix.row(i).transpose() };
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));

        Self {
            planes: [
                Plane::from_coefficients(r3 + r0),
                Plane::from_coefficients(r3 - r0),
                Plane::from_coefficients(r3 + r1),
                Plane::from_coefficients(r3 - r1),
                Plane::from_coefficients(r3 + r2),
                Plane::from_coefficients(r3 - r2),
            ],
        }
    }
}
