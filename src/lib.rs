//! Temporal Buffer - bounded timelines for streaming samples
//!
//! Acquisition threads push samples (camera frames, tracking matrices, sensor
//! readings) stamped with their capture time; processing and rendering threads
//! pull the sample closest to the instant they care about. Independently
//! clocked streams are synchronized by asking each timeline for its nearest
//! entry to a common timestamp.
//!
//! # Core Types
//!
//! - **Timeline**: Ordered `timestamp -> element` store with a capacity bound
//! - **Element**: Immutable timestamped record, cheap to clone
//! - **BufferWriter**: Pool-backed fixed-stride buffer being filled by a producer
//! - **Direction**: Which side of a query timestamp a match may come from
//!
//! # Architecture: Timeline / Producers / Consumers
//!
//! 1. **Timeline** - the substrate: sorted map, eviction, pool, lock
//! 2. **Producers** - push elements, usually from one acquisition thread
//! 3. **Consumers** - read by exact or nearest timestamp, and subscribe to
//!    clear events to drop derived state
//!
//! # Core Concepts
//!
//! - **Bounded window**: once full, every push evicts the oldest timestamp
//! - **Key order is authoritative**: a late push of an older sample lands in
//!   its place, not at the end
//! - **Two element kinds**: fixed-stride buffers carved from one arena, or
//!   variable-size blobs; a timeline accepts exactly one kind
//! - **Reader/writer lock**: mutators are exclusive, reads are shared, no
//!   lock is held across I/O or observer code
//!
//! # Example: Matching a frame to a tracking matrix
//!
//! ```rust
//! use temporal_buffer::{Direction, Element, SlotLayout, Timeline, TimelineConfig};
//!
//! // Tracking matrices: one 4x4 f32 matrix per buffer, 50 retained.
//! let matrices = Timeline::new(TimelineConfig::fixed_stride(SlotLayout::f32s(16, 1)))?;
//! matrices.allocate(50)?;
//!
//! // Camera frames: variable-size blobs.
//! let frames = Timeline::new(TimelineConfig::new(50))?;
//!
//! for (i, t) in [100.0, 133.0, 166.0].into_iter().enumerate() {
//!     let mut matrix = matrices.create_buffer(t + 2.0)?;
//!     matrix.set_f32s(0, &[i as f32; 16])?;
//!     matrices.push(matrix)?;
//!
//!     frames.push(Element::blob(t, vec![0u8; 640 * 480]))?;
//! }
//!
//! // Render the newest frame with the pose measured closest to it.
//! let frame = frames.get_newest().expect("frame");
//! let pose = matrices
//!     .get_closest(frame.timestamp(), Direction::Both)
//!     .expect("pose");
//! assert_eq!(pose.timestamp(), 168.0);
//! assert_eq!(pose.as_slots().unwrap().f32s(0).unwrap()[0], 2.0);
//!
//! // A pose strictly in the past of the frame: none before 100.
//! assert!(matrices.get_closest(100.0, Direction::Past).is_none());
//! # Ok::<(), temporal_buffer::TimelineError>(())
//! ```

mod config;
mod element;
mod error;
mod observer;
mod pool;
mod query;
mod timeline;

pub use config::{ElementKind, SlotLayout, TimelineConfig, DEFAULT_CAPACITY, MAX_SLOTS_PER_BUFFER};
pub use element::{timestamp_now, BufferWriter, Element, Payload, SlotBuffer, Timestamp};
pub use error::{Result, TimelineError};
pub use observer::{ChannelObserver, TimelineEvent, TimelineObserver};
pub use query::Direction;
pub use timeline::Timeline;
