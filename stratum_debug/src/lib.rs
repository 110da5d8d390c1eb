// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording, pretty-printing, Chrome trace export, and surface dumps for
//! stratum diagnostics.
//!
//! This crate provides [`CompositeSink`](stratum_core::trace::CompositeSink)
//! and [`DumpHook`](stratum_core::trace::DumpHook) implementations for
//! development and post-mortem analysis:
//!
//! - [`pretty::PrettyPrintSink`]: human-readable one-line-per-event output.
//! - [`recorder::RecorderSink`]: compact binary recording with
//!   [`recorder::decode`] for playback.
//! - [`chrome::export`]: writes Chrome Trace Event Format JSON from
//!   recorded bytes.
//! - [`dump::PngDumpHook`]: writes intermediate surfaces to PNG files.

pub mod chrome;
pub mod dump;
pub mod pretty;
pub mod recorder;
