//! Just enough of the Wormhole VAA wire format to locate the claim account it would create.

use solana_sdk::pubkey::Pubkey;

use crate::errors::TrackerError;

const SIGNATURE_LEN: usize = 66;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vaa {
    pub guardian_set_index: u32,
    pub signature_count: u8,
    pub timestamp: u32,
    pub emitter_chain: u16,
    pub emitter_address: [u8; 32],
    pub sequence: u64,
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8], TrackerError> {
        let end = self
            .pos
            .checked_add(n)
            .ok_or_else(|| TrackerError::InvalidVaa(format!("{what}: length overflow")))?;
        let out = self.buf.get(self.pos..end).ok_or_else(|| {
            TrackerError::InvalidVaa(format!(
                "truncated at {what} (need {end} bytes, have {})",
                self.buf.len()
            ))
        })?;
        self.pos = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N], TrackerError> {
        let s = self.take(N, what)?;
        <[u8; N]>::try_from(s).map_err(|_| TrackerError::InvalidVaa(format!("bad {what}")))
    }

    fn u8(&mut self, what: &str) -> Result<u8, TrackerError> {
        Ok(u8::from_be_bytes(self.array::<1>(what)?))
    }

    fn u16(&mut self, what: &str) -> Result<u16, TrackerError> {
        Ok(u16::from_be_bytes(self.array::<2>(what)?))
    }

    fn u32(&mut self, what: &str) -> Result<u32, TrackerError> {
        Ok(u32::from_be_bytes(self.array::<4>(what)?))
    }

    fn u64(&mut self, what: &str) -> Result<u64, TrackerError> {
        Ok(u64::from_be_bytes(self.array::<8>(what)?))
    }
}

impl Vaa {
    pub fn parse(bytes: &[u8]) -> Result<Self, TrackerError> {
        let mut r = Reader::new(bytes);
        let version = r.u8("version")?;
        if version != 1 {
            return Err(TrackerError::UnsupportedVaaVersion(version));
        }
        let guardian_set_index = r.u32("guardian set index")?;
        let signature_count = r.u8("signature count")?;
        r.take(usize::from(signature_count) * SIGNATURE_LEN, "signatures")?;

        let timestamp = r.u32("timestamp")?;
        r.take(4, "nonce")?;
        let emitter_chain = r.u16("emitter chain")?;
        let emitter_address = r.array::<32>("emitter address")?;
        let sequence = r.u64("sequence")?;
        r.take(1, "consistency level")?;
        // The remainder is the application payload, which the claim account does not depend on.

        Ok(Self {
            guardian_set_index,
            signature_count,
            timestamp,
            emitter_chain,
            emitter_address,
            sequence,
        })
    }

    /// Account the bridge program creates when this VAA is redeemed.
    pub fn claim_address(&self, program_id: &Pubkey) -> Pubkey {
        let (pk, _) = Pubkey::find_program_address(
            &[
                &self.emitter_address,
                &self.emitter_chain.to_be_bytes(),
                &self.sequence.to_be_bytes(),
            ],
            program_id,
        );
        pk
    }
}
