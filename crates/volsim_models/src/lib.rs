//! # volsim_models (L2: Models)
//!
//! Stochastic dynamics and smile mathematics consumed by the engine.
//!
//! This crate provides:
//! - Heston parameters and the full-truncation Euler step (`models::heston`)
//! - The Hagan SABR smile with degeneracy guards (`models::sabr`)
//! - ATM-anchored and least-squares smile calibration (`calibration`)
//! - Delta-to-strike inversion against any [`OptionOracle`] (`strike`)
//! - A lognormal reference oracle with implied-volatility inversion
//!   (`analytical`)
//!
//! ## Design Principles
//!
//! - **Validated construction**: parameter structs are checked once in `new`
//!   and immutable afterwards
//! - **Static dispatch** over the oracle seam
//! - **No silent fallbacks**: unreachable strikes, failed fits and
//!   degenerate smile evaluations are errors, never default values
//!
//! [`OptionOracle`]: volsim_core::traits::OptionOracle

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod analytical;
pub mod calibration;
pub mod models;
pub mod strike;
