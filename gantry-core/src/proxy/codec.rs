//! # Dynamic Message Codec
//!
//! A `tonic::codec::Codec` that lets the transport carry descriptor-typed
//! messages without generated structs.
//!
//! The encoder writes a [`DynamicMessage`] straight to the wire; the
//! message already knows its schema. The decoder deliberately does *not*
//! interpret the response: it hands back the raw frame so the stub can
//! separate "the backend answered garbage" (an internal `Unknown`) from
//! "the backend answered with a status" (passed through to the client).
use bytes::{Buf, Bytes};
use prost::Message;
use prost_reflect::DynamicMessage;
use tonic::{
    Status,
    codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder},
};

#[derive(Debug, Default, Clone)]
pub(crate) struct DynamicCodec;

impl Codec for DynamicCodec {
    type Encode = DynamicMessage;
    type Decode = Bytes;

    type Encoder = DynamicEncoder;
    type Decoder = RawFrameDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        DynamicEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        RawFrameDecoder
    }
}

/// Serializes a schema-carrying message into the gRPC frame.
pub(crate) struct DynamicEncoder;

impl Encoder for DynamicEncoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        item.encode_raw(dst);
        Ok(())
    }
}

/// Yields the complete response frame without decoding it.
pub(crate) struct RawFrameDecoder;

impl Decoder for RawFrameDecoder {
    type Item = Bytes;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        Ok(Some(src.copy_to_bytes(src.remaining())))
    }
}
