//! Conversions between command words and their mnemonic strings
use crate::{
    commands::{CTLR_CMD_MAX, MAX_BOARD_ID},
    error::{ArcError, Result},
    location,
};

/// Shortest mnemonic accepted by [`encode_command`]
pub const MIN_MNEMONIC_LEN: usize = 2;
/// Longest mnemonic, one character per byte of the command word
pub const MAX_MNEMONIC_LEN: usize = 4;

/// Tag the PCIe board expects in the upper byte of every command packet word
pub const PACKET_WORD_TAG: u32 = 0xAC000000;
/// Mask of the bits in a packet word available for data
pub const PACKET_DATA_MASK: u32 = 0x00FFFFFF;

/// Returns true for bytes allowed in a mnemonic.
pub const fn is_mnemonic_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Packs a 2 to 4 character mnemonic big-endian into the low bytes of a word.
///
/// ```
/// use arc_protocol::codec::encode_command;
///
/// assert_eq!(encode_command("SEX").unwrap(), 0x00534558);
/// assert_eq!(encode_command("TOUT").unwrap(), 0x544F5554);
/// ```
pub fn encode_command(mnemonic: &str) -> Result<u32> {
    let bytes = mnemonic.as_bytes();
    if !(MIN_MNEMONIC_LEN..=MAX_MNEMONIC_LEN).contains(&bytes.len()) {
        return Err(ArcError::invalid_argument(
            location!("encode_command"),
            format!(
                "Mnemonic \"{}\" must be {} to {} characters long",
                mnemonic, MIN_MNEMONIC_LEN, MAX_MNEMONIC_LEN
            ),
        ));
    }
    if let Some(pos) = bytes.iter().position(|b| !is_mnemonic_byte(*b)) {
        return Err(ArcError::invalid_argument(
            location!("encode_command"),
            format!(
                "Mnemonic \"{}\" contains invalid character at position {}",
                mnemonic.escape_default(),
                pos
            ),
        ));
    }
    Ok(bytes
        .iter()
        .fold(0u32, |word, byte| (word << 8) | *byte as u32))
}

/// Renders a command or reply word as its mnemonic.
///
/// Scanning starts at the most significant non-zero byte. If the remaining 2 to 4 bytes
/// are all mnemonic characters, they are returned as a string.
/// Otherwise, the word is rendered as an uppercase hex literal.
///
/// ```
/// use arc_protocol::codec::decode_command;
///
/// assert_eq!(decode_command(0x0054444C), "TDL");
/// assert_eq!(decode_command(0x00455252), "ERR");
/// assert_eq!(decode_command(0x212223), "0x212223");
/// ```
pub fn decode_command(word: u32) -> String {
    let bytes = word.to_be_bytes();
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    let mnemonic = &bytes[start..];
    if mnemonic.len() >= MIN_MNEMONIC_LEN && mnemonic.iter().all(|b| is_mnemonic_byte(*b)) {
        // Only ASCII bytes pass the check above
        mnemonic.iter().map(|b| *b as char).collect()
    } else {
        format!("0x{:X}", word)
    }
}

/// Renders a list of words separated by spaces.
pub fn decode_commands(words: &[u32]) -> String {
    words
        .iter()
        .map(|word| decode_command(*word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Describes a reply in the context of the command packet it answers.
///
/// ```
/// use arc_protocol::{codec::decode_command_list, commands::*};
///
/// assert_eq!(decode_command_list(DON, &[TIM_ID, TDL, 0x1234]), "[ 0x2 TDL 0x1234 -> DON ]");
/// ```
pub fn decode_command_list(reply: u32, commands: &[u32]) -> String {
    if commands.is_empty() {
        return format!("[ -> {} ]", decode_command(reply));
    }
    format!(
        "[ {} -> {} ]",
        decode_commands(commands),
        decode_command(reply)
    )
}

/// A command addressed to one of the controller boards, as written to the PCIe
/// command registers.
///
/// The first word is the header: the board id shifted left by 8, or'ed with the
/// total number of words including the header. Every word must fit into 24 bits,
/// the upper byte carries [`PACKET_WORD_TAG`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandPacket {
    words: Vec<u32>,
}

impl CommandPacket {
    /// Builds a packet from `[board_id, command, args..]`.
    ///
    /// At most [`CTLR_CMD_MAX`] words are accepted and the board id must not
    /// exceed [`MAX_BOARD_ID`].
    pub fn new(command_list: &[u32]) -> Result<CommandPacket> {
        let (board, rest) = command_list.split_first().ok_or_else(|| {
            ArcError::invalid_argument(location!("CommandPacket::new"), "Empty command list")
        })?;
        if command_list.len() > CTLR_CMD_MAX {
            return Err(ArcError::invalid_argument(
                location!("CommandPacket::new"),
                format!(
                    "Command list too large. Cannot exceed four arguments! Got {} words",
                    command_list.len()
                ),
            ));
        }
        if *board > MAX_BOARD_ID {
            return Err(ArcError::invalid_argument(
                location!("CommandPacket::new"),
                format!("Invalid board id: 0x{:X}", board),
            ));
        }
        let header = (*board << 8) | command_list.len() as u32;
        let mut words = Vec::with_capacity(command_list.len());
        words.push(verify_24_bits(header)?);
        for word in rest {
            words.push(verify_24_bits(*word)?);
        }
        Ok(CommandPacket { words })
    }

    /// The header word, without the tag
    pub fn header(&self) -> u32 {
        self.words[0]
    }

    /// Header followed by command and arguments, without the tag
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// The words as written to the board: each tagged with [`PACKET_WORD_TAG`]
    pub fn tagged_words(&self) -> impl Iterator<Item = u32> + '_ {
        self.words.iter().map(|word| PACKET_WORD_TAG | word)
    }
}

fn verify_24_bits(value: u32) -> Result<u32> {
    if value & !PACKET_DATA_MASK != 0 {
        return Err(ArcError::invalid_argument(
            location!("verify_24_bits"),
            format!(
                "Data value {} [ 0x{:X} ] too large! Must be 24-bits or less!",
                value, value
            ),
        ));
    }
    Ok(value)
}

#[test]
fn encode_packs_big_endian() {
    assert_eq!(encode_command("DON").unwrap(), 0x00444F4E);
    assert_eq!(encode_command("ALL").unwrap(), 0x00414C4C);
    assert_eq!(encode_command("_LR").unwrap(), 0x005F4C52);
    assert_eq!(encode_command("HERR").unwrap(), 0x48455252);
    assert_eq!(encode_command("MH").unwrap(), 0x00004D48);
}

#[test]
fn decode_falls_back_to_hex() {
    assert_eq!(decode_command(0), "0x0");
    assert_eq!(decode_command(0x41), "0x41");
    assert_eq!(decode_command(0x00530045), "0x530045");
    assert_eq!(decode_command(0xAC534558), "0xAC534558");
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::commands::*;

    const ALPHABET: &[u8] = b"AZaz09_";

    #[test]
    fn encode_rejects_bad_lengths() {
        for mnemonic in ["", "S", "SEXXY"] {
            match encode_command(mnemonic) {
                Err(ArcError::InvalidArgument { location, .. }) => {
                    assert_eq!(location.operation, "encode_command")
                }
                other => panic!("expected InvalidArgument, got {:?}", other),
            }
        }
    }

    #[test]
    fn encode_rejects_non_mnemonic_characters() {
        for mnemonic in ["S X", "!\"#", "SE\n", "DÖN", "A\0B"] {
            assert!(
                matches!(
                    encode_command(mnemonic),
                    Err(ArcError::InvalidArgument { .. })
                ),
                "{:?}",
                mnemonic
            );
        }
    }

    #[test]
    fn mnemonics_round_trip() {
        let mut count = 0;
        for len in MIN_MNEMONIC_LEN..=MAX_MNEMONIC_LEN {
            let mut indices = vec![0usize; len];
            loop {
                let mnemonic: String = indices.iter().map(|i| ALPHABET[*i] as char).collect();
                let word = encode_command(&mnemonic).unwrap();
                assert_eq!(decode_command(word), mnemonic);
                count += 1;

                // advance the odometer
                let mut pos = 0;
                while pos < len {
                    indices[pos] += 1;
                    if indices[pos] < ALPHABET.len() {
                        break;
                    }
                    indices[pos] = 0;
                    pos += 1;
                }
                if pos == len {
                    break;
                }
            }
        }
        assert_eq!(count, 7 * 7 + 7 * 7 * 7 + 7 * 7 * 7 * 7);
    }

    #[test]
    fn replies_decode() {
        assert_eq!(decode_command(DON), "DON");
        assert_eq!(decode_command(ERR), "ERR");
        assert_eq!(decode_command(TOUT), "TOUT");
        assert_eq!(decode_command(SYR), "SYR");
    }

    #[test]
    fn command_list_context() {
        assert_eq!(
            decode_command_list(DON, &[TIM_ID, SEX]),
            "[ 0x2 SEX -> DON ]"
        );
        assert_eq!(
            decode_command_list(ERR, &[UTIL_ID, SOS, AMP_LR]),
            "[ 0x3 SOS _LR -> ERR ]"
        );
        assert_eq!(decode_command_list(0x212223, &[]), "[ -> 0x212223 ]");
    }

    #[test]
    fn packet_header_counts_all_words() {
        let packet = CommandPacket::new(&[TIM_ID, WRM, X_MEM | 0x10, 0x55]).unwrap();
        assert_eq!(packet.header(), 0x0204);
        assert_eq!(packet.words(), &[0x0204, WRM, 0x200010, 0x55]);
        assert_eq!(
            packet.tagged_words().collect::<Vec<_>>(),
            vec![0xAC000204, 0xAC57524D, 0xAC200010, 0xAC000055]
        );
    }

    #[test]
    fn packet_rejects_wide_words() {
        assert!(matches!(
            CommandPacket::new(&[TIM_ID, TOUT]),
            Err(ArcError::InvalidArgument { .. })
        ));
        assert!(matches!(
            CommandPacket::new(&[0x10000, TDL]),
            Err(ArcError::InvalidArgument { .. })
        ));
        assert!(CommandPacket::new(&[]).is_err());
    }

    #[test]
    fn packet_length_is_limited() {
        let full = [TIM_ID, WRM, X_MEM | 0x10, 1, 2, 3];
        assert_eq!(full.len(), CTLR_CMD_MAX);
        assert_eq!(CommandPacket::new(&full).unwrap().header(), 0x0206);

        for len in [CTLR_CMD_MAX + 1, 9, 256, 300] {
            let mut list = vec![0u32; len];
            list[0] = TIM_ID;
            let err = CommandPacket::new(&list).unwrap_err();
            assert!(matches!(err, ArcError::InvalidArgument { .. }));
            assert!(
                err.to_string().starts_with(
                    "Invalid argument: Command list too large. Cannot exceed four arguments!"
                )
            );
        }
    }

    #[test]
    fn packet_board_id_fits_the_header() {
        assert_eq!(
            CommandPacket::new(&[MAX_BOARD_ID, TDL]).unwrap().header(),
            0xFF02
        );
        for board in [0x100, 0x1234, 0x10000] {
            let err = CommandPacket::new(&[board, TDL]).unwrap_err();
            assert!(
                err.to_string()
                    .starts_with("Invalid argument: Invalid board id"),
                "{}",
                err
            );
        }
    }
}
