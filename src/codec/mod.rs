//! Column codecs built on the stream header protocol and the integer kernels.
//!
//! Every codec writes a run of self-describing streams and reads them back
//! from an explicit cursor. Column-level framing (stream counts, present
//! streams) is the tile layer's job.

pub mod boolean;
pub mod float;
pub mod geometry;
pub mod integer;
pub mod string;
