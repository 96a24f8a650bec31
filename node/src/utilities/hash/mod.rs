use digest::consts::U32;
use digest::Digest;

type Blake2b256 = blake2::Blake2b<U32>;

pub fn blake2_256(data: &[u8]) -> [u8; 32] {
    let mut dest = [0; 32];
    dest.copy_from_slice(Blake2b256::digest(data).as_slice());
    dest
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(blake2_256(b"chain"), blake2_256(b"chain"));
        assert_ne!(blake2_256(b"chain"), blake2_256(b"chains"));
    }
}
