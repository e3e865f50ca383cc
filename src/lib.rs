//! A software drawing surface with an HTML5-canvas-style API.
//!
//! A [`Session`] draws to one target of a [`Display`], either directly
//! or through an offscreen buffer published with [`Session::present`].
//! Drawing happens through direct method calls or through batches of
//! [`Command`]s, which may also arrive in wire form as [`RawCommand`]s.

mod buffer;
mod color;
pub mod command;
mod context;
mod display;
pub mod image;
mod interpreter;
mod path;
pub mod scroll;
mod session;
mod surface;
mod text;
mod thread_pool;
mod types;

pub use buffer::{Buffers, SurfaceUnavailable};
pub use color::{Color, ColorParseError};
pub use command::{Command, DecodeError, ImagePlacement, Operand, RawCommand};
pub use context::{DrawingContext, DrawingState};
pub use display::Display;
pub use crate::image::{ImageEvent, ImageHandle, ImageRegistry, ImageSource, LoadError, LoadState};
pub use interpreter::{execute, execute_raw, CommandOutput};
pub use path::{Path, PathSegment};
pub use session::{Session, SessionBuilder};
pub use surface::Surface;
pub use text::{Font, FontParseError, Fonts, MalformedFont, TextMetrics};
pub use thread_pool::{BasicThreadPool, InlineThreadPool, Task, ThreadPool};
pub use types::{CompositeOp, LineCap, LineJoin, TextAlign, TextBaseline, UnknownKeyword};
