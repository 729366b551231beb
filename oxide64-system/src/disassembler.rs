// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use oxide64_core::factory::Cpu;

// Design:
//   Two flat tables map every opcode to its mnemonic and addressing mode;
//   undocumented instructions are listed with their common names and
//   flagged. Operands render in hex or decimal.

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Mode {
    Imp,
    Acc,
    Imm,
    Zp,
    ZpX,
    ZpY,
    Abs,
    AbX,
    AbY,
    Ind,
    IzX,
    IzY,
    Rel,
}

impl Mode {
    pub fn len(self) -> u16 {
        match self {
            Mode::Imp | Mode::Acc => 1,
            Mode::Imm
            | Mode::Zp
            | Mode::ZpX
            | Mode::ZpY
            | Mode::IzX
            | Mode::IzY
            | Mode::Rel => 2,
            Mode::Abs | Mode::AbX | Mode::AbY | Mode::Ind => 3,
        }
    }
}

use self::Mode::*;

#[cfg_attr(rustfmt, rustfmt_skip)]
static MNEMONICS: [&str; 256] = [
    "BRK", "ORA", "KIL", "SLO", "NOP", "ORA", "ASL", "SLO", "PHP", "ORA", "ASL", "ANC", "NOP", "ORA", "ASL", "SLO",
    "BPL", "ORA", "KIL", "SLO", "NOP", "ORA", "ASL", "SLO", "CLC", "ORA", "NOP", "SLO", "NOP", "ORA", "ASL", "SLO",
    "JSR", "AND", "KIL", "RLA", "BIT", "AND", "ROL", "RLA", "PLP", "AND", "ROL", "ANC", "BIT", "AND", "ROL", "RLA",
    "BMI", "AND", "KIL", "RLA", "NOP", "AND", "ROL", "RLA", "SEC", "AND", "NOP", "RLA", "NOP", "AND", "ROL", "RLA",
    "RTI", "EOR", "KIL", "SRE", "NOP", "EOR", "LSR", "SRE", "PHA", "EOR", "LSR", "ALR", "JMP", "EOR", "LSR", "SRE",
    "BVC", "EOR", "KIL", "SRE", "NOP", "EOR", "LSR", "SRE", "CLI", "EOR", "NOP", "SRE", "NOP", "EOR", "LSR", "SRE",
    "RTS", "ADC", "KIL", "RRA", "NOP", "ADC", "ROR", "RRA", "PLA", "ADC", "ROR", "ARR", "JMP", "ADC", "ROR", "RRA",
    "BVS", "ADC", "KIL", "RRA", "NOP", "ADC", "ROR", "RRA", "SEI", "ADC", "NOP", "RRA", "NOP", "ADC", "ROR", "RRA",
    "NOP", "STA", "NOP", "SAX", "STY", "STA", "STX", "SAX", "DEY", "NOP", "TXA", "ANE", "STY", "STA", "STX", "SAX",
    "BCC", "STA", "KIL", "AHX", "STY", "STA", "STX", "SAX", "TYA", "STA", "TXS", "TAS", "SHY", "STA", "SHX", "AHX",
    "LDY", "LDA", "LDX", "LAX", "LDY", "LDA", "LDX", "LAX", "TAY", "LDA", "TAX", "LXA", "LDY", "LDA", "LDX", "LAX",
    "BCS", "LDA", "KIL", "LAX", "LDY", "LDA", "LDX", "LAX", "CLV", "LDA", "TSX", "LAS", "LDY", "LDA", "LDX", "LAX",
    "CPY", "CMP", "NOP", "DCP", "CPY", "CMP", "DEC", "DCP", "INY", "CMP", "DEX", "SBX", "CPY", "CMP", "DEC", "DCP",
    "BNE", "CMP", "KIL", "DCP", "NOP", "CMP", "DEC", "DCP", "CLD", "CMP", "NOP", "DCP", "NOP", "CMP", "DEC", "DCP",
    "CPX", "SBC", "NOP", "ISB", "CPX", "SBC", "INC", "ISB", "INX", "SBC", "NOP", "SBC", "CPX", "SBC", "INC", "ISB",
    "BEQ", "SBC", "KIL", "ISB", "NOP", "SBC", "INC", "ISB", "SED", "SBC", "NOP", "ISB", "NOP", "SBC", "INC", "ISB",
];

#[cfg_attr(rustfmt, rustfmt_skip)]
static MODES: [Mode; 256] = [
    Imp, IzX, Imp, IzX, Zp,  Zp,  Zp,  Zp,  Imp, Imm, Acc, Imm, Abs, Abs, Abs, Abs,
    Rel, IzY, Imp, IzY, ZpX, ZpX, ZpX, ZpX, Imp, AbY, Imp, AbY, AbX, AbX, AbX, AbX,
    Abs, IzX, Imp, IzX, Zp,  Zp,  Zp,  Zp,  Imp, Imm, Acc, Imm, Abs, Abs, Abs, Abs,
    Rel, IzY, Imp, IzY, ZpX, ZpX, ZpX, ZpX, Imp, AbY, Imp, AbY, AbX, AbX, AbX, AbX,
    Imp, IzX, Imp, IzX, Zp,  Zp,  Zp,  Zp,  Imp, Imm, Acc, Imm, Abs, Abs, Abs, Abs,
    Rel, IzY, Imp, IzY, ZpX, ZpX, ZpX, ZpX, Imp, AbY, Imp, AbY, AbX, AbX, AbX, AbX,
    Imp, IzX, Imp, IzX, Zp,  Zp,  Zp,  Zp,  Imp, Imm, Acc, Imm, Ind, Abs, Abs, Abs,
    Rel, IzY, Imp, IzY, ZpX, ZpX, ZpX, ZpX, Imp, AbY, Imp, AbY, AbX, AbX, AbX, AbX,
    Imm, IzX, Imm, IzX, Zp,  Zp,  Zp,  Zp,  Imp, Imm, Imp, Imm, Abs, Abs, Abs, Abs,
    Rel, IzY, Imp, IzY, ZpX, ZpX, ZpY, ZpY, Imp, AbY, Imp, AbY, AbX, AbX, AbY, AbY,
    Imm, IzX, Imm, IzX, Zp,  Zp,  Zp,  Zp,  Imp, Imm, Imp, Imm, Abs, Abs, Abs, Abs,
    Rel, IzY, Imp, IzY, ZpX, ZpX, ZpY, ZpY, Imp, AbY, Imp, AbY, AbX, AbX, AbY, AbY,
    Imm, IzX, Imm, IzX, Zp,  Zp,  Zp,  Zp,  Imp, Imm, Imp, Imm, Abs, Abs, Abs, Abs,
    Rel, IzY, Imp, IzY, ZpX, ZpX, ZpX, ZpX, Imp, AbY, Imp, AbY, AbX, AbX, AbX, AbX,
    Imm, IzX, Imm, IzX, Zp,  Zp,  Zp,  Zp,  Imp, Imm, Imp, Imm, Abs, Abs, Abs, Abs,
    Rel, IzY, Imp, IzY, ZpX, ZpX, ZpX, ZpX, Imp, AbY, Imp, AbY, AbX, AbX, AbX, AbX,
];

pub fn mnemonic(opcode: u8) -> &'static str {
    MNEMONICS[opcode as usize]
}

pub fn addressing_mode(opcode: u8) -> Mode {
    MODES[opcode as usize]
}

pub fn instruction_length(opcode: u8) -> u16 {
    MODES[opcode as usize].len()
}

pub fn is_illegal(opcode: u8) -> bool {
    match MNEMONICS[opcode as usize] {
        "KIL" | "SLO" | "RLA" | "SRE" | "RRA" | "SAX" | "LAX" | "DCP" | "ISB" | "ANC" | "ALR"
        | "ARR" | "ANE" | "LXA" | "SBX" | "LAS" | "TAS" | "AHX" | "SHX" | "SHY" => true,
        "NOP" => opcode != 0xea,
        "SBC" => opcode == 0xeb,
        _ => false,
    }
}

pub struct Disassembler;

impl Disassembler {
    /// Renders the instruction `offset` instructions past `address`.
    /// Returns the text and the instruction length.
    pub fn disassemble(cpu: &dyn Cpu, address: u16, offset: u16, hex: bool) -> (String, u16) {
        let mut address = address;
        for _ in 0..offset {
            let opcode = cpu.read(address);
            address = address.wrapping_add(instruction_length(opcode));
        }
        let opcode = cpu.read(address);
        let length = instruction_length(opcode);
        let operand8 = cpu.read(address.wrapping_add(1));
        let operand16 = u16::from(operand8)
            | (u16::from(cpu.read(address.wrapping_add(2))) << 8);
        let mnemonic = mnemonic(opcode);
        let operand = match addressing_mode(opcode) {
            Imp => String::new(),
            Acc => "A".to_string(),
            Imm => format_operand(operand8, hex, "#"),
            Zp => format_operand(operand8, hex, ""),
            ZpX => format_operand(operand8, hex, "") + ",X",
            ZpY => format_operand(operand8, hex, "") + ",Y",
            Abs => format_operand16(operand16, hex, ""),
            AbX => format_operand16(operand16, hex, "") + ",X",
            AbY => format_operand16(operand16, hex, "") + ",Y",
            Ind => format!("({})", format_operand16(operand16, hex, "")),
            IzX => format!("({},X)", format_operand(operand8, hex, "")),
            IzY => format!("({}),Y", format_operand(operand8, hex, "")),
            Rel => {
                let target = address
                    .wrapping_add(2)
                    .wrapping_add(operand8 as i8 as u16);
                format_operand16(target, hex, "")
            }
        };
        let mut bytes = String::new();
        for i in 0..3 {
            if i < length {
                bytes.push_str(&format!("{:02x} ", cpu.read(address.wrapping_add(i))));
            } else {
                bytes.push_str("   ");
            }
        }
        let marker = if is_illegal(opcode) { "*" } else { " " };
        let text = format!(
            "{:04x}  {} {}{} {}",
            address, bytes, mnemonic, marker, operand
        );
        (text, length)
    }
}

fn format_operand(value: u8, hex: bool, prefix: &str) -> String {
    if hex {
        format!("{}${:02x}", prefix, value)
    } else {
        format!("{}{}", prefix, value)
    }
}

fn format_operand16(value: u16, hex: bool, prefix: &str) -> String {
    if hex {
        format!("{}${:04x}", prefix, value)
    } else {
        format!("{}{}", prefix, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lengths_follow_addressing_mode() {
        assert_eq!(1, instruction_length(0xea)); // NOP
        assert_eq!(2, instruction_length(0xa9)); // LDA #imm
        assert_eq!(3, instruction_length(0xad)); // LDA abs
        assert_eq!(3, instruction_length(0x6c)); // JMP (ind)
    }

    #[test]
    fn documented_opcodes_are_not_flagged() {
        assert!(!is_illegal(0xea));
        assert!(!is_illegal(0xa9));
        assert!(is_illegal(0x02)); // KIL
        assert!(is_illegal(0x0f)); // SLO
        assert!(is_illegal(0x80)); // NOP #imm
    }
}
