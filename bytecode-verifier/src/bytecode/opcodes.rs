pub const PUSH1: u8 = 0x60;
pub const PUSH32: u8 = 0x7f;

/// A decoded EVM instruction with the operand bytes of `PUSH*` attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction<'a> {
    pub offset: usize,
    pub opcode: u8,
    /// May be shorter than the declared width if the code ends inside the operand.
    pub operand: &'a [u8],
}

impl Instruction<'_> {
    pub fn is_push(&self) -> bool {
        (PUSH1..=PUSH32).contains(&self.opcode)
    }
}

fn operand_width(opcode: u8) -> usize {
    if (PUSH1..=PUSH32).contains(&opcode) {
        (opcode - 0x5f) as usize
    } else {
        0
    }
}

pub struct Instructions<'a> {
    code: &'a [u8],
    position: usize,
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Instruction<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.position;
        let opcode = *self.code.get(offset)?;

        let operand_start = offset + 1;
        let operand_end = (operand_start + operand_width(opcode)).min(self.code.len());
        self.position = operand_end;

        Some(Instruction {
            offset,
            opcode,
            operand: &self.code[operand_start..operand_end],
        })
    }
}

pub fn decode(code: &[u8]) -> Instructions<'_> {
    Instructions { code, position: 0 }
}

/// The instruction stream without operands.
pub fn opcode_bytes(code: &[u8]) -> Vec<u8> {
    decode(code).map(|instruction| instruction.opcode).collect()
}

/// Compares two codes instruction by instruction.
///
/// `PUSH*` operands may differ only when the compiled operand is all zeros
/// and the live one is not: solc leaves immutable variables as zeroed
/// placeholders which get assigned during deployment.
pub fn instructions_match(live: &[u8], compiled: &[u8]) -> bool {
    let mut live = decode(live);
    let mut compiled = decode(compiled);

    loop {
        match (live.next(), compiled.next()) {
            (None, None) => return true,
            (Some(live), Some(compiled)) => {
                if live.opcode != compiled.opcode || live.operand.len() != compiled.operand.len() {
                    return false;
                }
                if live.operand != compiled.operand
                    && !is_immutable_placeholder(live.operand, compiled.operand)
                {
                    return false;
                }
            }
            _ => return false,
        }
    }
}

fn is_immutable_placeholder(live: &[u8], compiled: &[u8]) -> bool {
    compiled.iter().all(|byte| *byte == 0) && live.iter().any(|byte| *byte != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn decode_hex(hex: &str) -> Vec<u8> {
        hex::decode(hex).unwrap()
    }

    #[test]
    fn decodes_push_operands() {
        // PUSH1 0x80 PUSH1 0x40 MSTORE PUSH2 0x0102 STOP
        let code = decode_hex("60806040526101020000");
        let instructions: Vec<_> = decode(&code).collect();

        assert_eq!(
            vec![
                Instruction { offset: 0, opcode: 0x60, operand: &[0x80] },
                Instruction { offset: 2, opcode: 0x60, operand: &[0x40] },
                Instruction { offset: 4, opcode: 0x52, operand: &[] },
                Instruction { offset: 5, opcode: 0x61, operand: &[0x01, 0x02] },
                Instruction { offset: 8, opcode: 0x00, operand: &[] },
                Instruction { offset: 9, opcode: 0x00, operand: &[] },
            ],
            instructions
        );
    }

    #[test]
    fn push0_has_no_operand() {
        let code = decode_hex("5f5f");
        assert_eq!(vec![0x5f, 0x5f], opcode_bytes(&code));
    }

    #[test]
    fn truncated_push_keeps_available_bytes() {
        // PUSH4 with only two operand bytes left
        let code = decode_hex("630102");
        let instructions: Vec<_> = decode(&code).collect();
        assert_eq!(1, instructions.len());
        assert_eq!(&[0x01, 0x02], instructions[0].operand);
    }

    #[test]
    fn push_data_is_not_decoded_as_opcodes() {
        // PUSH2 0x6060 STOP
        let code = decode_hex("61606000");
        assert_eq!(vec![0x61, 0x00], opcode_bytes(&code));
    }

    #[test]
    fn immutable_placeholder_matches() {
        let zeros = "00".repeat(32);
        let value = format!("{}2a", "00".repeat(31));
        let compiled = decode_hex(&format!("7f{zeros}5000"));
        let live = decode_hex(&format!("7f{value}5000"));

        assert!(instructions_match(&live, &compiled));
        assert_ne!(live, compiled);
    }

    #[test]
    fn zero_live_value_against_non_zero_compiled_does_not_match() {
        let zeros = "00".repeat(32);
        let value = format!("{}2a", "00".repeat(31));
        let compiled = decode_hex(&format!("7f{value}5000"));
        let live = decode_hex(&format!("7f{zeros}5000"));

        assert!(!instructions_match(&live, &compiled));
    }

    #[test]
    fn different_non_zero_operands_do_not_match() {
        assert!(!instructions_match(&decode_hex("6001"), &decode_hex("6002")));
    }

    #[test]
    fn different_opcodes_do_not_match() {
        assert!(!instructions_match(&decode_hex("6001"), &decode_hex("6101")));
        assert!(!instructions_match(&decode_hex("600100"), &decode_hex("6001")));
    }
}
