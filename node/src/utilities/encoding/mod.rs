pub fn to_hex<T: AsRef<[u8]>>(data: T) -> String {
    array_bytes::bytes2hex("", data.as_ref())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_to_hex_has_no_prefix() {
        assert_eq!(to_hex([0u8, 15, 255]), "000fff");
    }
}
