//! Edge Side Includes resolution.
//!
//! # Data Flow
//! ```text
//! Captured HTML body
//!     → buffer.rs (RwLock-protected bytes)
//!     → directive.rs (scan for <esi:include ...>, parse attributes)
//!     → engine.rs (one task per distinct directive, barrier, substitute)
//!         → processor.rs (include: side-request, splice body)
//!             → partitioner.rs (member: session → identity header)
//!     → repeat until no directives, round cap, or deadline
//! ```

pub mod buffer;
pub mod directive;
pub mod engine;
pub mod partitioner;
pub mod processor;

pub use buffer::DirectiveBuffer;
pub use directive::{Directive, DirectiveError, INVALID_TAG_MARKER};
pub use engine::{EsiEngine, Resolution, ResolutionOutcome};
pub use partitioner::{MemberPartitioner, Partitioner, PartitionerRegistry};
pub use processor::{EsiError, IncludeProcessor, Processor, ProcessorRegistry};
