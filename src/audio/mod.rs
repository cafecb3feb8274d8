//! # Audio Module
//!
//! Voice playback for the bot: every clip, joke or GPT answer that has to be
//! heard goes through here.
//!
//! ## Architecture
//!
//! ### [`scheduler`] - Playback Scheduler
//! - One FIFO queue per guild, drained by at most one worker
//! - Workers are spawned on demand and exit when their queue empties
//! - Every voice call is bounded by a timeout so a stuck connection never
//!   blocks the queue
//!
//! ### [`guard`] - Access Guard
//! - Users can forbid the bot from joining their voice channel for a while
//! - Checked against the channel occupants right before each playback
//!
//! ### [`voice`] - Voice collaborators
//! - [`voice::VoiceGateway`] implemented over Songbird
//! - [`voice::ChannelOccupancy`] implemented over the Serenity cache
//!
//! ### [`library`] - Local clips
//! - `.mp3` files shipped in the audio directory
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! let (request, ticket) = PlaybackRequest::new(
//!     AudioSource::Stored("Audio/clip.mp3".into()),
//!     VoiceTarget::new(guild_id, channel_id),
//! );
//! scheduler.submit(request);
//!
//! match ticket.wait_timeout(Duration::from_secs(600)).await {
//!     Ok(()) => info!("clip played"),
//!     Err(e) => warn!("clip not played: {e}"),
//! }
//! ```

pub mod guard;
pub mod library;
pub mod request;
pub mod scheduler;
pub mod voice;

pub use guard::AccessGuard;
pub use library::ClipLibrary;
pub use request::{AudioSource, PlaybackOutcome, PlaybackRequest, PlaybackTicket, VoiceTarget};
pub use scheduler::{PlaybackScheduler, VoiceTimeouts};
