//! Pipeline stages for PDF proofreading.
//!
//! Each submodule implements one step; [`crate::analyze`] drives them.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ (checker) ──▶ annotate ──▶ report ──▶ preview
//! (upload)  (pdfium)     (HTTP)       (classify)   (lopdf)    (pdfium)
//! ```
//!
//! 1. [`input`]: put the submitted document on disk, remove it afterwards
//! 2. [`extract`]: concatenate page text; runs in `spawn_blocking`
//! 3. [`classify`]: map a rule id to an [`classify::ErrorCategory`]
//! 4. [`annotate`]: split the text into plain and highlighted segments and
//!    build one detail entry per match
//! 5. [`report`]: lay out and write the annotated PDF
//! 6. [`preview`]: rasterise page 1 of the report to PNG
//!
//! [`pdfium`] holds the process-wide library binding shared by 2 and 6.

pub mod annotate;
pub mod classify;
pub mod extract;
pub mod input;
pub mod pdfium;
pub mod preview;
pub mod report;
