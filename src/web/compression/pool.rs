//! Pools of idle encoders, one pool per content coding

use bytes::Bytes;
use serde::Serialize;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

use super::encoders::{ContentCoding, EncoderSettings, StreamEncoder, new_encoder};
use crate::config::CompressionConfig;

/// Pool counters
///
/// `reused` counts checkouts served from the idle list. A reused gzip encoder
/// keeps its deflate state and buffers; a reused brotli encoder only keeps
/// its output buffer, because the compressor is rebuilt for every stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub created: u64,
    pub reused: u64,
    pub idle: usize,
}

pub struct EncoderPool {
    coding: ContentCoding,
    settings: EncoderSettings,
    max_idle: usize,
    idle: Mutex<Vec<Box<dyn StreamEncoder>>>,
    created: AtomicU64,
    reused: AtomicU64,
}

impl EncoderPool {
    pub fn new(coding: ContentCoding, settings: EncoderSettings, max_idle: usize) -> Self {
        Self {
            coding,
            settings,
            max_idle,
            idle: Mutex::new(Vec::new()),
            created: AtomicU64::new(0),
            reused: AtomicU64::new(0),
        }
    }

    pub fn coding(&self) -> ContentCoding {
        self.coding
    }

    /// Take an idle encoder or create one; it returns to the pool when the
    /// guard is dropped
    pub fn checkout(self: &Arc<Self>) -> PooledEncoder {
        let idle = self.lock_idle().pop();
        let encoder = match idle {
            Some(encoder) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                encoder
            }
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                trace!("Creating new {} encoder", self.coding);
                new_encoder(self.coding, &self.settings)
            }
        };

        PooledEncoder {
            encoder: Some(encoder),
            pool: Arc::clone(self),
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            idle: self.lock_idle().len(),
        }
    }

    fn release(&self, mut encoder: Box<dyn StreamEncoder>) {
        encoder.reset();
        let mut idle = self.lock_idle();
        if idle.len() < self.max_idle {
            idle.push(encoder);
        }
    }

    fn lock_idle(&self) -> MutexGuard<'_, Vec<Box<dyn StreamEncoder>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An encoder on loan from an [`EncoderPool`]
///
/// Dropping the guard resets the encoder and returns it, whether or not the
/// stream it was serving completed.
pub struct PooledEncoder {
    encoder: Option<Box<dyn StreamEncoder>>,
    pool: Arc<EncoderPool>,
}

impl PooledEncoder {
    pub fn coding(&self) -> ContentCoding {
        self.pool.coding
    }

    pub fn encode_chunk(&mut self, chunk: &[u8]) -> io::Result<Bytes> {
        self.encoder()?.encode_chunk(chunk)
    }

    pub fn finish(&mut self) -> io::Result<Bytes> {
        self.encoder()?.finish()
    }

    fn encoder(&mut self) -> io::Result<&mut Box<dyn StreamEncoder>> {
        self.encoder
            .as_mut()
            .ok_or_else(|| io::Error::other("encoder already returned to its pool"))
    }
}

impl Drop for PooledEncoder {
    fn drop(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.pool.release(encoder);
        }
    }
}

/// The gzip and brotli pools used by the compression middleware
#[derive(Clone)]
pub struct CompressionPools {
    gzip: Arc<EncoderPool>,
    brotli: Arc<EncoderPool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompressionStats {
    pub gzip: PoolStats,
    pub brotli: PoolStats,
}

impl CompressionPools {
    pub fn new(config: &CompressionConfig) -> Self {
        let settings = EncoderSettings {
            gzip_level: config.gzip_level,
            brotli_quality: config.brotli_quality,
            brotli_window: config.brotli_window,
        };
        Self {
            gzip: Arc::new(EncoderPool::new(
                ContentCoding::Gzip,
                settings,
                config.max_idle_encoders,
            )),
            brotli: Arc::new(EncoderPool::new(
                ContentCoding::Brotli,
                settings,
                config.max_idle_encoders,
            )),
        }
    }

    pub fn pool(&self, coding: ContentCoding) -> &Arc<EncoderPool> {
        match coding {
            ContentCoding::Gzip => &self.gzip,
            ContentCoding::Brotli => &self.brotli,
        }
    }

    pub fn stats(&self) -> CompressionStats {
        CompressionStats {
            gzip: self.gzip.stats(),
            brotli: self.brotli.stats(),
        }
    }
}

impl Default for CompressionPools {
    fn default() -> Self {
        Self::new(&CompressionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(max_idle: usize) -> Arc<EncoderPool> {
        Arc::new(EncoderPool::new(
            ContentCoding::Gzip,
            EncoderSettings {
                gzip_level: 1,
                brotli_quality: 4,
                brotli_window: 20,
            },
            max_idle,
        ))
    }

    #[test]
    fn test_encoders_are_reused() {
        let pool = pool(4);
        {
            let mut encoder = pool.checkout();
            encoder.encode_chunk(b"abc").unwrap();
            encoder.finish().unwrap();
        }
        assert_eq!(pool.stats().idle, 1);

        let _again = pool.checkout();
        let stats = pool.stats();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.reused, 1);
        assert_eq!(stats.idle, 0);
    }

    #[test]
    fn test_abandoned_encoder_is_reset_before_reuse() {
        let pool = pool(4);
        {
            let mut encoder = pool.checkout();
            encoder.encode_chunk(b"half a stream").unwrap();
        }

        let mut encoder = pool.checkout();
        let mut out = encoder.encode_chunk(b"fresh").unwrap().to_vec();
        out.extend_from_slice(&encoder.finish().unwrap());

        let mut decoded = String::new();
        std::io::Read::read_to_string(&mut flate2::read::GzDecoder::new(&out[..]), &mut decoded)
            .unwrap();
        assert_eq!(decoded, "fresh");
    }

    #[test]
    fn test_idle_set_is_bounded() {
        let pool = pool(2);
        let guards: Vec<_> = (0..5).map(|_| pool.checkout()).collect();
        drop(guards);
        let stats = pool.stats();
        assert_eq!(stats.created, 5);
        assert_eq!(stats.idle, 2);
    }

    #[test]
    fn test_pools_by_coding() {
        let pools = CompressionPools::default();
        assert_eq!(pools.pool(ContentCoding::Gzip).coding(), ContentCoding::Gzip);
        assert_eq!(
            pools.pool(ContentCoding::Brotli).checkout().coding(),
            ContentCoding::Brotli
        );
        assert_eq!(pools.stats().brotli.created, 1);
    }
}
