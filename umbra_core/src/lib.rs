// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shadow tree, hierarchy optimizer, and mount operation queue for
//! declarative native UIs.
//!
//! `umbra_core` is the native half of a declarative UI runtime: scripts
//! describe a tree of typed views, and this crate turns those descriptions
//! into flexbox layout and a minimal set of mutations against real platform
//! views. Three view trees are in play: the scripted tree the embedder
//! mirrors, the *shadow tree* this crate owns (one node per scripted view,
//! carrying props and layout), and the mounted hierarchy of host views,
//! which is usually much shallower because layout-only containers are
//! collapsed out of it.
//!
//! # Architecture
//!
//! Mutations flow one way, from the shadow thread to the UI thread, with
//! the operation queue as the only crossing:
//!
//! ```text
//!   script bridge (shadow thread)
//!       │
//!       ▼
//!   Reconciler ──► ShadowTree (flexbox via taffy)
//!       │               │
//!       │          HierarchyOptimizer (collapse / promote / offsets)
//!       │               │
//!       └──► OpQueue::seal_batch ─────────────── thread boundary ──┐
//!                                                                  ▼
//!                             FrameScheduler tick ──► OpQueue::flush
//!                                                          │
//!                                                          ▼
//!                                                    MountManager ──► host views
//! ```
//!
//! **[`tag`]** — View identity ([`Tag`](tag::Tag)) and batch identity.
//!
//! **[`host`]** — The embedder surface: [`HostView`](host::HostView) and
//! [`HostContainer`](host::HostContainer) traits, static
//! [`ViewKind`](host::ViewKind) capability records, and the
//! [`ViewRegistry`](host::ViewRegistry).
//!
//! **[`props`]** — JSON prop maps with diff merging and the layout-only
//! classification that drives collapsing.
//!
//! **[`style`]** — Prop-map to flexbox-style conversion.
//!
//! **[`shadow`]** — The [`ShadowTree`](shadow::ShadowTree): topology,
//! native-child accounting, the layout pass, and pixel-snapped frames.
//!
//! **[`optimizer`]** — The
//! [`HierarchyOptimizer`](optimizer::HierarchyOptimizer), which collapses
//! layout-only containers and splices their descendants into ancestors.
//!
//! **[`ops`]** — The [`OpQueue`](ops::OpQueue): three operation lanes,
//! atomic batch sealing, and the UI-thread flush.
//!
//! **[`mount`]** — The [`MountManager`](mount::MountManager): owner of the
//! mounted view map, delete transitions, and measurement.
//!
//! **[`scheduler`]** — The [`FrameScheduler`](scheduler::FrameScheduler):
//! class-ordered one-shot frame callbacks over a platform vsync driver.
//!
//! **[`reconciler`]** — The [`Reconciler`](reconciler::Reconciler) facade
//! the script bridge drives, including the batch boundary.
//!
//! **[`error`]** — [`TreeError`](error::TreeError), the error surface of
//! everything above.
//!
//! **[`trace`]** — [`TraceSink`](trace::TraceSink) and event types for
//! pipeline instrumentation, with the zero-overhead
//! [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one
//!   branch per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-op
//!   apply events and optimizer promotion events.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod error;
pub mod host;
pub mod mount;
pub mod ops;
pub mod optimizer;
pub mod props;
pub mod reconciler;
pub mod scheduler;
pub mod shadow;
pub mod style;
pub mod tag;
pub mod trace;

mod layout;
