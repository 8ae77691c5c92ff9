use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::codec::{decode_envelope, encode_envelope, find_sync, Envelope, DEFAULT_MAX_PAYLOAD, SYNC};
use crate::error::FrameError;

/// `tokio-util` codec for envelopes, for hosts that read the link with
/// `FramedRead`.
///
/// Line noise ahead of a sync marker is skipped inside the decoder, since a
/// decode error ends a framed stream. A false marker whose length exceeds the
/// maximum payload counts as noise too.
#[derive(Debug, Clone)]
pub struct EnvelopeCodec {
    max_payload: usize,
    discarded: u64,
}

impl EnvelopeCodec {
    pub fn new(max_payload: usize) -> Self {
        Self {
            max_payload,
            discarded: 0,
        }
    }

    /// Bytes skipped while hunting for a sync marker.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    fn skip_to_sync(&mut self, src: &mut BytesMut) {
        let skip = match find_sync(&src[1..]) {
            Some(offset) => offset + 1,
            None if src[src.len() - 1] == SYNC[0] => src.len() - 1,
            None => src.len(),
        };
        src.advance(skip);
        self.discarded += skip as u64;
        debug!(discarded = skip, "skipped bytes before sync marker");
    }
}

impl Default for EnvelopeCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD)
    }
}

impl Decoder for EnvelopeCodec {
    type Item = Envelope;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match decode_envelope(src, self.max_payload) {
                Err(FrameError::InvalidSync) | Err(FrameError::PayloadTooLarge { .. }) => {
                    self.skip_to_sync(src)
                }
                other => return other,
            }
        }
    }
}

impl Encoder<Envelope> for EnvelopeCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Envelope, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.payload.len() > self.max_payload {
            return Err(FrameError::PayloadTooLarge {
                size: item.payload.len(),
                max: self.max_payload,
            });
        }
        encode_envelope(item.sequence, &item.payload, dst)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::codec::frame;

    #[tokio::test]
    async fn framed_read_yields_envelopes() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&frame(b"camera", 0).unwrap());
        wire.extend_from_slice(&frame(b"radar", 1).unwrap());

        let mut framed = FramedRead::new(wire.as_slice(), EnvelopeCodec::default());
        let first = framed.next().await.unwrap().unwrap();
        let second = framed.next().await.unwrap().unwrap();

        assert_eq!((first.sequence, first.payload.as_ref()), (0, b"camera".as_ref()));
        assert_eq!((second.sequence, second.payload.as_ref()), (1, b"radar".as_ref()));
        assert!(framed.next().await.is_none());
    }

    #[tokio::test]
    async fn noise_before_marker_is_skipped() {
        let mut wire = vec![0x01, 0x55, 0x02, 0x03];
        wire.extend_from_slice(&frame(b"after", 9).unwrap());

        let mut framed = FramedRead::new(wire.as_slice(), EnvelopeCodec::default());
        let envelope = framed.next().await.unwrap().unwrap();

        assert_eq!(envelope.sequence, 9);
        assert_eq!(framed.decoder().discarded(), 4);
    }

    #[tokio::test]
    async fn false_marker_with_oversized_length_is_skipped() {
        let mut wire = vec![0x10, 0x55, 0x55, 0x00, 0xFF, 0xFF, 0xFF, 0x7F, 0x20, 0x30];
        wire.extend_from_slice(&frame(b"after", 9).unwrap());

        let mut framed = FramedRead::new(wire.as_slice(), EnvelopeCodec::default());
        let envelope = framed.next().await.unwrap().unwrap();

        assert_eq!((envelope.sequence, envelope.payload.as_ref()), (9, b"after".as_ref()));
        assert_eq!(framed.decoder().discarded(), 10);
        assert!(framed.next().await.is_none());
    }

    #[tokio::test]
    async fn framed_write_matches_sync_encoding() {
        let mut out = Vec::new();
        {
            let mut framed = FramedWrite::new(&mut out, EnvelopeCodec::default());
            framed
                .send(Envelope::new(5, Bytes::from_static(b"payload")))
                .await
                .unwrap();
        }

        assert_eq!(out, frame(b"payload", 5).unwrap().to_vec());
    }

    #[test]
    fn encoder_enforces_max_payload() {
        let mut codec = EnvelopeCodec::new(2);
        let mut dst = BytesMut::new();
        let err = codec
            .encode(Envelope::new(0, Bytes::from_static(b"abc")), &mut dst)
            .unwrap_err();

        assert!(matches!(err, FrameError::PayloadTooLarge { size: 3, max: 2 }));
        assert!(dst.is_empty());
    }
}
