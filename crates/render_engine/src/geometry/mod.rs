//! Bounding volumes and intersection primitives
//!
//! Self-contained geometric types used by culling and picking: axis-aligned
//! boxes, spheres, oriented boxes, rays, planes, and the view frustum.
//! Ray queries return the hit point as an `Option`; a miss is a normal
//! outcome, not an error.

mod aabb;
mod frustum;
mod obb;
mod plane;
mod ray;
mod sphere;

pub use aabb::Aabb;
pub use frustum::{Containment, Frustum, FrustumPlane};
pub use obb::OrientedBox;
pub use plane::Plane;
pub use ray::Ray;
pub use sphere::BoundingSphere;
