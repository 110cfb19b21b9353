use super::*;
use std::collections::HashSet;

mod random {
    use super::*;

    #[test]
    fn test_random_address_has_requested_length_and_alphabet() {
        let address = generate_random(8);

        assert_eq!(address.len(), 8);
        assert!(
            address
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        );
    }

    #[test]
    fn test_random_addresses_are_distinct() {
        let addresses: HashSet<Address> = (0..1000).map(|_| generate_random(8)).collect();
        assert_eq!(addresses.len(), 1000);
    }

    #[test]
    fn test_random_length_clamped_to_address_bounds() {
        let shortest = generate_random(0);
        let longest = generate_random(MAX_ADDRESS_LENGTH + 100);

        assert_eq!(shortest.len(), 1);
        assert_eq!(longest.len(), MAX_ADDRESS_LENGTH);
        assert_eq!(Address::try_from(longest.as_str()).unwrap(), longest);
    }

    #[test]
    fn test_random_address_round_trips_through_validation() {
        let address = generate_random(12);
        assert_eq!(Address::try_from(address.as_str()).unwrap(), address);
    }
}

mod custom {
    use super::*;

    #[test]
    fn test_validate_custom_respects_length_bounds() {
        let rules = AddressConfig::default();

        assert!(!validate_custom("abcd", &rules));
        assert!(validate_custom("abcde", &rules));
        assert!(validate_custom(&"a".repeat(20), &rules));
        assert!(!validate_custom(&"a".repeat(21), &rules));
    }

    #[test]
    fn test_validate_custom_rejects_non_alphanumeric() {
        let rules = AddressConfig::default();

        assert!(validate_custom("TeamRoom42", &rules));
        assert!(!validate_custom("team-room", &rules));
        assert!(!validate_custom("team room", &rules));
        assert!(!validate_custom("会议室会议室", &rules));
    }
}

mod filenames {
    use super::*;

    #[test]
    fn test_sanitize_replaces_separators_and_reserved_symbols() {
        assert_eq!(sanitize_filename("../etc/passwd"), ".._etc_passwd");
        assert_eq!(sanitize_filename("a\\b:c*d?e"), "a_b_c_d_e");
        assert_eq!(sanitize_filename("x<>|\"y"), "x_y");
    }

    #[test]
    fn test_sanitize_preserves_unicode_letters() {
        assert_eq!(sanitize_filename("报告 2024.pdf"), "报告 2024.pdf");
        assert_eq!(sanitize_filename("résumé.docx"), "résumé.docx");
    }

    #[test]
    fn test_sanitize_collapses_underscores() {
        assert_eq!(sanitize_filename("a__b///c"), "a_b_c");
    }

    #[test]
    fn test_sanitize_neutralizes_dot_names() {
        assert_eq!(sanitize_filename(".."), "_");
        assert_eq!(sanitize_filename("."), "_");
        assert_eq!(sanitize_filename(""), "_");
    }

    #[test]
    fn test_sanitize_caps_length_in_characters() {
        let long = "字".repeat(400);
        let sanitized = sanitize_filename(&long);
        assert_eq!(sanitized.chars().count(), MAX_FILENAME_CHARS);
    }

    #[test]
    fn test_file_id_is_32_lowercase_hex_chars() {
        let id = generate_file_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(id, generate_file_id());
    }
}

mod encoding_repair {
    use super::*;

    /// Decodes UTF-8 bytes one byte per character, as a Latin-1 reader would.
    fn latin1_misread(original: &str) -> String {
        original.bytes().map(char::from).collect()
    }

    #[test]
    fn test_repairs_misdecoded_utf8() {
        let garbled = latin1_misread("报告.pdf");
        assert_ne!(garbled, "报告.pdf");
        assert_eq!(repair_filename_encoding(&garbled), "报告.pdf");
    }

    #[test]
    fn test_keeps_correct_unicode_name() {
        assert_eq!(repair_filename_encoding("报告.pdf"), "报告.pdf");
    }

    #[test]
    fn test_keeps_genuine_latin1_name() {
        // "é" alone is not a valid UTF-8 sequence once reinterpreted.
        assert_eq!(repair_filename_encoding("café.txt"), "café.txt");
    }

    #[test]
    fn test_keeps_ascii_name() {
        assert_eq!(repair_filename_encoding("notes.txt"), "notes.txt");
    }
}
