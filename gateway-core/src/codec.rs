use prost::Message;
use prost_reflect::{DynamicMessage, MessageDescriptor};
use tonic::codec::{BufferSettings, Codec, Decoder, Encoder};
use tonic::Status;

/// A gRPC codec for prost-reflect DynamicMessage.
///
/// tonic's stock codec works with compile-time generated types; the gateway
/// only learns the request and response shapes when the descriptors are
/// loaded, so encoding and decoding are driven by message descriptors
/// resolved at registration time.
pub struct DynamicCodec {
    request: MessageDescriptor,
    response: MessageDescriptor,
}

impl DynamicCodec {
    pub fn new(request: MessageDescriptor, response: MessageDescriptor) -> Self {
        DynamicCodec { request, response }
    }
}

impl Codec for DynamicCodec {
    type Encode = DynamicMessage;
    type Decode = DynamicMessage;
    type Encoder = DynamicEncoder;
    type Decoder = DynamicDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        DynamicEncoder {
            _request: self.request.clone(),
        }
    }

    fn decoder(&mut self) -> Self::Decoder {
        DynamicDecoder {
            response: self.response.clone(),
        }
    }
}

/// Encodes the merged request message into protobuf wire format.
pub struct DynamicEncoder {
    _request: MessageDescriptor,
}

impl Encoder for DynamicEncoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn encode(
        &mut self,
        item: Self::Item,
        dst: &mut tonic::codec::EncodeBuf<'_>,
    ) -> Result<(), Self::Error> {
        item.encode(dst)
            .map_err(|e| Status::internal(format!("failed to encode request: {e}")))?;
        Ok(())
    }

    fn buffer_settings(&self) -> BufferSettings {
        BufferSettings::default()
    }
}

/// Decodes the backend response from protobuf wire format.
pub struct DynamicDecoder {
    response: MessageDescriptor,
}

impl Decoder for DynamicDecoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn decode(
        &mut self,
        src: &mut tonic::codec::DecodeBuf<'_>,
    ) -> Result<Option<Self::Item>, Self::Error> {
        let msg = DynamicMessage::decode(self.response.clone(), src)
            .map_err(|e| Status::internal(format!("failed to decode response: {e}")))?;
        Ok(Some(msg))
    }

    fn buffer_settings(&self) -> BufferSettings {
        BufferSettings::default()
    }
}
