//! This module is the central hub for all pure, stateless compression kernels.
//!
//! Each submodule implements exactly one reversible transform over plain slices
//! or a byte cursor. Kernels know nothing about stream headers or columns; the
//! `codec` layer composes them according to the stream metadata.

pub mod byte_rle;
pub mod delta;
pub mod fastpfor;
pub mod leb128;
pub mod morton;
pub mod rle;
pub mod zigzag;
