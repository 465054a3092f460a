#![no_main]

use arbitrary::Arbitrary;
use ferry_wire::{
    decode, encode, CodingConfig, Decode, Decoder, Depth, Encode, Encoder, Error, Position,
};
use libfuzzer_sys::fuzz_target;

/// A message shape exercising scalars, validated bytes, and nested
/// out-of-line objects.
#[derive(Arbitrary, Debug, Clone, PartialEq)]
struct Message {
    id: u64,
    active: bool,
    name: String,
    blob: Vec<u8>,
    scores: Vec<u32>,
}

impl Encode for Message {
    const INLINE_SIZE: usize = 64;

    fn encode<D: Depth>(
        &mut self,
        encoder: &mut Encoder<'_>,
        pos: Position,
        depth: D,
    ) -> Result<(), Error> {
        self.id.encode(encoder, pos, depth)?;
        self.active.encode(encoder, pos.offset(8), depth)?;
        self.name.encode(encoder, pos.offset(16), depth)?;
        self.blob.encode(encoder, pos.offset(32), depth)?;
        self.scores.encode(encoder, pos.offset(48), depth)
    }
}

impl Decode for Message {
    const INLINE_SIZE: usize = 64;

    fn decode<D: Depth>(
        decoder: &mut Decoder<'_>,
        pos: Position,
        depth: D,
    ) -> Result<Self, Error> {
        let id = <u64 as Decode>::decode(decoder, pos, depth)?;
        let active = <bool as Decode>::decode(decoder, pos.offset(8), depth)?;
        decoder.check_padding(pos.offset(9), 7)?;
        let name = <String as Decode>::decode(decoder, pos.offset(16), depth)?;
        let blob = <Vec<u8> as Decode>::decode(decoder, pos.offset(32), depth)?;
        let scores = <Vec<u32> as Decode>::decode(decoder, pos.offset(48), depth)?;
        Ok(Self {
            id,
            active,
            name,
            blob,
            scores,
        })
    }
}

#[derive(Arbitrary, Debug)]
enum Input {
    /// Hostile bytes straight into the decoder: any outcome but a panic.
    Decode(Vec<u8>),
    /// A well-formed value must survive an encode/decode cycle intact.
    Roundtrip(Message),
}

fuzz_target!(|input: Input| {
    match input {
        Input::Decode(bytes) => {
            let _ = decode::<Message>(&CodingConfig::EMPTY, &bytes, &mut []);
        }
        Input::Roundtrip(message) => {
            let mut arena = vec![
                0u8;
                256 + message.name.len()
                    + message.blob.len()
                    + message.scores.len() * 4
            ];
            let mut extents = Vec::new();
            let mut handles = Vec::new();
            let mut value = message.clone();
            encode(
                &CodingConfig::EMPTY,
                &mut value,
                &mut arena,
                &mut extents,
                &mut handles,
            )
            .expect("encoding a well-formed value must succeed");

            let total: usize = extents.iter().map(|e| e.len).sum();
            let decoded = decode::<Message>(&CodingConfig::EMPTY, &arena[..total], &mut [])
                .expect("decoding a freshly encoded value must succeed");
            assert_eq!(decoded, message);
        }
    }
});
