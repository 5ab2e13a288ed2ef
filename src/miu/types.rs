/// A byte queue that is invisible to bincode serialization.
/// Encodes as zero bytes; decodes as empty.  Used for host-facing transient
/// state (the UART TX drain queue) so that restoring a debugger snapshot
/// cannot replay bytes that were already handed to the host.
#[derive(Clone, Default)]
pub(crate) struct TransientBytes(pub(crate) Vec<u8>);

impl bincode::Encode for TransientBytes {
    fn encode<E: bincode::enc::Encoder>(
        &self,
        _encoder: &mut E,
    ) -> Result<(), bincode::error::EncodeError> {
        Ok(()) // write nothing
    }
}

impl<Context> bincode::Decode<Context> for TransientBytes {
    fn decode<D: bincode::de::Decoder>(
        _decoder: &mut D,
    ) -> Result<Self, bincode::error::DecodeError> {
        Ok(Self::default())
    }
}

impl<'de, Context> bincode::BorrowDecode<'de, Context> for TransientBytes {
    fn borrow_decode<D: bincode::de::BorrowDecoder<'de>>(
        _decoder: &mut D,
    ) -> Result<Self, bincode::error::DecodeError> {
        Ok(Self::default())
    }
}

impl core::ops::Deref for TransientBytes {
    type Target = Vec<u8>;
    fn deref(&self) -> &Vec<u8> {
        &self.0
    }
}

impl core::ops::DerefMut for TransientBytes {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.0
    }
}
