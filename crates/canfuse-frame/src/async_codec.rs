use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_frame, BusFrame};
use crate::error::FrameError;

/// `tokio_util` codec over the 16-byte SocketCAN frame layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct BusCodec;

impl Decoder for BusCodec {
    type Item = BusFrame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        decode_frame(src)
    }
}

impl Encoder<BusFrame> for BusCodec {
    type Error = FrameError;

    fn encode(&mut self, item: BusFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(&item, dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;

    #[tokio::test]
    async fn framed_write_then_read() {
        let mut sink = FramedWrite::new(Vec::<u8>::new(), BusCodec);
        sink.send(BusFrame::new(0x201, [1; 8])).await.unwrap();
        sink.send(BusFrame::new(0x000, [2; 8])).await.unwrap();
        let wire = sink.into_inner();

        let mut stream = FramedRead::new(wire.as_slice(), BusCodec);
        let first = stream.next().await.unwrap().unwrap();
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(first, BusFrame::new(0x201, [1; 8]));
        assert_eq!(second, BusFrame::new(0x000, [2; 8]));
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn decoder_waits_for_full_frame() {
        let mut buf = BytesMut::new();
        encode_frame(&BusFrame::zeroed(0x202), &mut buf);
        let mut partial = buf.split_to(10);

        let mut codec = BusCodec;
        assert!(codec.decode(&mut partial).unwrap().is_none());
        partial.unsplit(buf);
        assert_eq!(codec.decode(&mut partial).unwrap().unwrap().id, 0x202);
    }
}
