pub mod common;
pub mod coordinates;
pub mod domain;
pub mod nbody;
pub mod numerics;
pub mod separation;
