//! Acquisition of planar scans from two rotating laser-ranging sensors and alignment of captured
//! scans to each other with a multi-start ICP registration.

use std::error::Error;

pub mod assembler;
pub mod common;
pub mod config;
mod errors;
pub mod geom2;
pub mod io;
pub mod metrology;
pub mod protocol;
pub mod scan;
pub mod sensors;

pub use errors::InvalidGeometry;
pub use parry2d_f64::na;

pub type Point2 = parry2d_f64::na::Point2<f64>;
pub type Vector2 = parry2d_f64::na::Vector2<f64>;
pub type Iso2 = parry2d_f64::na::Isometry2<f64>;
pub type Aabb2 = parry2d_f64::bounding_volume::Aabb;

pub use geom2::align2::{IcpOptions, Minimizer, RegistrationResult, RigidParams, register};
pub use scan::{PolarSample, Scan, SensorKind};

pub type Result<T> = std::result::Result<T, Box<dyn Error>>;
