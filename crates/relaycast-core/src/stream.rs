//! Byte stream type passed between the fetcher and the stager.

use bytes::Bytes;
use futures::Stream;
use std::io;
use std::pin::Pin;

/// Forward-only stream of source bytes, consumed exactly once.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;
