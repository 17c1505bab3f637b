//! Certificate layout editor core.
//!
//! An operator places typed elements (text, image, shape, QR placeholder) on
//! fixed-size pages; the layout is persisted as a JSON design document that an
//! external service renders into per-participant PDFs. This crate owns the
//! in-memory element model, the pointer-driven selection/transform engine, the
//! asset/image cache, and the serialization contract between the canvas and
//! the persisted document. The host is responsible only for wiring input
//! events to the session and painting the [`render::Scene`] it returns.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`element`] | Element model: typed elements, defaults, lenient decoding, patches |
//! | [`pages`] | Page store: ordered pages, navigation, invariant-checked mutation |
//! | [`engine`] | Selection & transform controller ([`engine::EngineCore`]) |
//! | [`input`] | Input event types and the gesture state machine |
//! | [`hit`] | Hit-testing against rendered nodes and transform handles |
//! | [`transform`] | Resize/rotate math and the transform commit routine |
//! | [`camera`] | Stage scale/offset and screen-to-page conversion |
//! | [`cache`] | Asset/image cache keyed by element id, QR rasterization |
//! | [`assets`] | Asset URL resolution, fetch/upload seams, local preview URLs |
//! | [`fonts`] | Web font loading seam |
//! | [`render`] | Render nodes arena and display-list construction |
//! | [`template`] | Design document serialization |
//! | [`session`] | One editing session: engine + cache + async plumbing |
//! | [`api`] | Template CRUD and asset upload HTTP client |
//! | [`config`] | Environment-driven configuration |
//! | [`consts`] | Shared numeric constants (size floors, handle sizes, defaults) |

pub mod api;
pub mod assets;
pub mod cache;
pub mod camera;
pub mod color;
pub mod config;
pub mod consts;
pub mod element;
pub mod engine;
pub mod fonts;
pub mod hit;
pub mod input;
pub mod pages;
pub mod render;
pub mod session;
pub mod template;
pub mod transform;
