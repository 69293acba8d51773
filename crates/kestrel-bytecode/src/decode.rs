//! Lazy instruction stream decoder
//!
//! Decodes one instruction at a time in a single forward pass. The stream is
//! restartable: [`InstructionStream::reset_to`] repositions it at any known
//! instruction boundary, which is how the translator revisits a basic block.
//!
//! Branch targets are resolved to absolute byte offsets during decoding, so
//! consumers never deal with relative displacements or switch padding.

use crate::constant::PoolIndex;
use crate::error::{BytecodeError, Result};
use crate::opcode::Opcode;

/// Decoded operands of a single instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operands {
    /// No operands
    None,
    /// Local variable slot index (widened forms included)
    Local(u16),
    /// Local slot and signed increment
    Iinc {
        /// Local variable slot index
        local: u16,
        /// Signed increment
        delta: i16,
    },
    /// Constant pool index
    Constant(PoolIndex),
    /// Signed 8-bit immediate
    Imm8(i8),
    /// Signed 16-bit immediate
    Imm16(i16),
    /// Absolute branch target
    Branch(u32),
    /// Dense switch: `targets[i]` handles key `low + i`
    TableSwitch {
        /// Absolute default target
        default: u32,
        /// Lowest key
        low: i32,
        /// Highest key
        high: i32,
        /// Absolute targets, one per key in `low..=high`
        targets: Vec<u32>,
    },
    /// Sparse switch: sorted `(key, target)` pairs
    LookupSwitch {
        /// Absolute default target
        default: u32,
        /// Match pairs, keys strictly increasing
        pairs: Vec<(i32, u32)>,
    },
    /// Primitive array element type tag
    ArrayType(u8),
    /// Multi-dimensional array allocation
    MultiArray {
        /// Class entry of the array type
        index: PoolIndex,
        /// Number of dimensions to allocate
        dims: u8,
    },
}

/// One decoded instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedOp {
    /// Byte offset of the opcode (the `wide` prefix for widened forms)
    pub offset: u32,
    /// The opcode
    pub opcode: Opcode,
    /// Decoded operands
    pub operands: Operands,
}

impl DecodedOp {
    /// Absolute targets this instruction may branch to, default included
    pub fn branch_targets(&self) -> Vec<u32> {
        match &self.operands {
            Operands::Branch(target) => vec![*target],
            Operands::TableSwitch {
                default, targets, ..
            } => {
                let mut out = Vec::with_capacity(targets.len() + 1);
                out.push(*default);
                out.extend_from_slice(targets);
                out
            }
            Operands::LookupSwitch { default, pairs } => {
                let mut out = Vec::with_capacity(pairs.len() + 1);
                out.push(*default);
                out.extend(pairs.iter().map(|&(_, t)| t));
                out
            }
            _ => Vec::new(),
        }
    }
}

/// Forward decoder over a method's bytecode
#[derive(Debug, Clone)]
pub struct InstructionStream<'a> {
    code: &'a [u8],
    pos: usize,
}

impl<'a> InstructionStream<'a> {
    /// Create a stream positioned at offset 0
    pub fn new(code: &'a [u8]) -> Self {
        Self { code, pos: 0 }
    }

    /// Current byte offset
    #[inline]
    pub fn offset(&self) -> u32 {
        self.pos as u32
    }

    /// Total code length in bytes
    #[inline]
    pub fn len(&self) -> u32 {
        self.code.len() as u32
    }

    /// Whether the code is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Reposition at a known instruction boundary
    #[inline]
    pub fn reset_to(&mut self, offset: u32) {
        self.pos = offset as usize;
    }

    /// Decode the next instruction, `None` at end of stream
    pub fn next_op(&mut self) -> Result<Option<DecodedOp>> {
        if self.pos >= self.code.len() {
            return Ok(None);
        }
        let offset = self.pos as u32;
        let byte = self.code[self.pos];
        self.pos += 1;
        let opcode = Opcode::from_byte(byte).ok_or(BytecodeError::UnknownOpcode {
            opcode: byte,
            offset,
        })?;
        let operands = self.decode_operands(opcode, offset)?;
        Ok(Some(DecodedOp {
            offset,
            opcode,
            operands,
        }))
    }

    fn decode_operands(&mut self, opcode: Opcode, offset: u32) -> Result<Operands> {
        use Opcode::*;
        Ok(match opcode {
            Bipush => Operands::Imm8(self.read_u8(opcode, offset)? as i8),
            Sipush => Operands::Imm16(self.read_u16(opcode, offset)? as i16),
            Ldc => Operands::Constant(PoolIndex(u16::from(self.read_u8(opcode, offset)?))),
            LdcW | Ldc2W | Getstatic | Putstatic | Getfield | Putfield | Invokevirtual
            | Invokespecial | Invokestatic | New | Anewarray | Checkcast | Instanceof => {
                Operands::Constant(PoolIndex(self.read_u16(opcode, offset)?))
            }
            Invokeinterface | Invokedynamic => {
                // Index followed by two historical bytes (count and zero).
                let index = PoolIndex(self.read_u16(opcode, offset)?);
                self.read_u16(opcode, offset)?;
                Operands::Constant(index)
            }
            Iload | Lload | Fload | Dload | Aload | Istore | Lstore | Fstore | Dstore | Astore
            | Ret => Operands::Local(u16::from(self.read_u8(opcode, offset)?)),
            Iinc => {
                let local = u16::from(self.read_u8(opcode, offset)?);
                let delta = i16::from(self.read_u8(opcode, offset)? as i8);
                Operands::Iinc { local, delta }
            }
            Ifeq | Ifne | Iflt | Ifge | Ifgt | Ifle | IfIcmpeq | IfIcmpne | IfIcmplt | IfIcmpge
            | IfIcmpgt | IfIcmple | IfAcmpeq | IfAcmpne | Ifnull | Ifnonnull | Goto | Jsr => {
                let rel = i64::from(self.read_u16(opcode, offset)? as i16);
                Operands::Branch(self.absolute_target(opcode, offset, rel)?)
            }
            GotoW | JsrW => {
                let rel = i64::from(self.read_u32(opcode, offset)? as i32);
                Operands::Branch(self.absolute_target(opcode, offset, rel)?)
            }
            Tableswitch => self.decode_tableswitch(offset)?,
            Lookupswitch => self.decode_lookupswitch(offset)?,
            Newarray => Operands::ArrayType(self.read_u8(opcode, offset)?),
            Multianewarray => {
                let index = PoolIndex(self.read_u16(opcode, offset)?);
                let dims = self.read_u8(opcode, offset)?;
                Operands::MultiArray { index, dims }
            }
            Wide => return self.decode_wide(offset),
            _ => Operands::None,
        })
    }

    fn decode_wide(&mut self, offset: u32) -> Result<Operands> {
        let byte = self.read_u8(Opcode::Wide, offset)?;
        let inner = Opcode::from_byte(byte).ok_or(BytecodeError::UnknownOpcode {
            opcode: byte,
            offset,
        })?;
        if !inner.can_widen() {
            return Err(BytecodeError::InvalidWide {
                mnemonic: inner.name(),
                offset,
            });
        }
        let local = self.read_u16(inner, offset)?;
        if inner == Opcode::Iinc {
            let delta = self.read_u16(inner, offset)? as i16;
            return Ok(Operands::Iinc { local, delta });
        }
        Ok(Operands::Local(local))
    }

    fn decode_tableswitch(&mut self, offset: u32) -> Result<Operands> {
        self.skip_switch_padding(Opcode::Tableswitch, offset)?;
        let rel = self.read_u32(Opcode::Tableswitch, offset)?;
        let default = self.switch_target(offset, rel)?;
        let low = self.read_u32(Opcode::Tableswitch, offset)? as i32;
        let high = self.read_u32(Opcode::Tableswitch, offset)? as i32;
        if low > high {
            return Err(BytecodeError::MalformedSwitch(offset));
        }
        let count = (i64::from(high) - i64::from(low) + 1) as usize;
        // Each target is four bytes; reject counts the stream cannot hold
        // before allocating.
        if count > (self.code.len() - self.pos) / 4 {
            return Err(BytecodeError::TruncatedOperands {
                mnemonic: Opcode::Tableswitch.name(),
                offset,
            });
        }
        let mut targets = Vec::with_capacity(count);
        for _ in 0..count {
            let rel = self.read_u32(Opcode::Tableswitch, offset)?;
            targets.push(self.switch_target(offset, rel)?);
        }
        Ok(Operands::TableSwitch {
            default,
            low,
            high,
            targets,
        })
    }

    fn decode_lookupswitch(&mut self, offset: u32) -> Result<Operands> {
        self.skip_switch_padding(Opcode::Lookupswitch, offset)?;
        let rel = self.read_u32(Opcode::Lookupswitch, offset)?;
        let default = self.switch_target(offset, rel)?;
        let npairs = self.read_u32(Opcode::Lookupswitch, offset)? as i32;
        if npairs < 0 {
            return Err(BytecodeError::MalformedSwitch(offset));
        }
        let count = npairs as usize;
        if count > (self.code.len() - self.pos) / 8 {
            return Err(BytecodeError::TruncatedOperands {
                mnemonic: Opcode::Lookupswitch.name(),
                offset,
            });
        }
        let mut pairs = Vec::with_capacity(count);
        let mut prev: Option<i32> = None;
        for _ in 0..count {
            let key = self.read_u32(Opcode::Lookupswitch, offset)? as i32;
            if prev.is_some_and(|p| p >= key) {
                return Err(BytecodeError::MalformedSwitch(offset));
            }
            prev = Some(key);
            let rel = self.read_u32(Opcode::Lookupswitch, offset)?;
            pairs.push((key, self.switch_target(offset, rel)?));
        }
        Ok(Operands::LookupSwitch { default, pairs })
    }

    /// Switch payloads are aligned so the default target starts on a
    /// four-byte boundary relative to the start of the code.
    fn skip_switch_padding(&mut self, opcode: Opcode, offset: u32) -> Result<()> {
        let pad = (4 - (self.pos % 4)) % 4;
        if self.pos + pad > self.code.len() {
            return Err(BytecodeError::TruncatedOperands {
                mnemonic: opcode.name(),
                offset,
            });
        }
        self.pos += pad;
        Ok(())
    }

    fn switch_target(&self, offset: u32, rel: u32) -> Result<u32> {
        self.absolute_target(Opcode::Tableswitch, offset, i64::from(rel as i32))
    }

    /// Resolve a displacement relative to the opcode's own offset.
    fn absolute_target(&self, opcode: Opcode, offset: u32, rel: i64) -> Result<u32> {
        let target = i64::from(offset) + rel;
        if target < 0 || target >= self.code.len() as i64 {
            return Err(BytecodeError::BranchOutOfRange {
                mnemonic: opcode.name(),
                offset,
            });
        }
        Ok(target as u32)
    }

    fn read_u8(&mut self, opcode: Opcode, offset: u32) -> Result<u8> {
        let byte = *self
            .code
            .get(self.pos)
            .ok_or(BytecodeError::TruncatedOperands {
                mnemonic: opcode.name(),
                offset,
            })?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_u16(&mut self, opcode: Opcode, offset: u32) -> Result<u16> {
        let hi = self.read_u8(opcode, offset)?;
        let lo = self.read_u8(opcode, offset)?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    fn read_u32(&mut self, opcode: Opcode, offset: u32) -> Result<u32> {
        let a = self.read_u8(opcode, offset)?;
        let b = self.read_u8(opcode, offset)?;
        let c = self.read_u8(opcode, offset)?;
        let d = self.read_u8(opcode, offset)?;
        Ok(u32::from_be_bytes([a, b, c, d]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(code: &[u8]) -> Result<Vec<DecodedOp>> {
        let mut stream = InstructionStream::new(code);
        let mut ops = Vec::new();
        while let Some(op) = stream.next_op()? {
            ops.push(op);
        }
        Ok(ops)
    }

    #[test]
    fn test_simple_sequence() {
        // iconst_2, iconst_3, iadd, ireturn
        let ops = decode_all(&[0x05, 0x06, 0x60, 0xAC]).unwrap();
        assert_eq!(ops.len(), 4);
        assert_eq!(ops[0].opcode, Opcode::Iconst2);
        assert_eq!(ops[2].opcode, Opcode::Iadd);
        assert_eq!(ops[3].offset, 3);
    }

    #[test]
    fn test_bipush_sign_extension() {
        let ops = decode_all(&[0x10, 0xFF, 0xB1]).unwrap();
        assert_eq!(ops[0].operands, Operands::Imm8(-1));
    }

    #[test]
    fn test_branch_absolute_target() {
        // 0: goto +5 -> 5; 3..4: nop; 5: return
        let ops = decode_all(&[0xA7, 0x00, 0x05, 0x00, 0x00, 0xB1]).unwrap();
        assert_eq!(ops[0].operands, Operands::Branch(5));
        assert_eq!(ops[0].branch_targets(), vec![5]);
    }

    #[test]
    fn test_backward_branch() {
        // 0: nop; 1: goto -1 -> 0
        let ops = decode_all(&[0x00, 0xA7, 0xFF, 0xFF]).unwrap();
        assert_eq!(ops[1].operands, Operands::Branch(0));
    }

    #[test]
    fn test_branch_out_of_range() {
        let err = decode_all(&[0xA7, 0x00, 0x40]).unwrap_err();
        assert!(matches!(err, BytecodeError::BranchOutOfRange { .. }));
    }

    #[test]
    fn test_unknown_opcode() {
        let err = decode_all(&[0xFE]).unwrap_err();
        assert!(matches!(
            err,
            BytecodeError::UnknownOpcode {
                opcode: 0xFE,
                offset: 0
            }
        ));
    }

    #[test]
    fn test_truncated_operands() {
        let err = decode_all(&[0x11, 0x01]).unwrap_err();
        assert!(matches!(err, BytecodeError::TruncatedOperands { .. }));
    }

    #[test]
    fn test_wide_iinc() {
        // wide iinc local=256 delta=-2
        let ops = decode_all(&[0xC4, 0x84, 0x01, 0x00, 0xFF, 0xFE, 0xB1]).unwrap();
        assert_eq!(
            ops[0].operands,
            Operands::Iinc {
                local: 256,
                delta: -2
            }
        );
        assert_eq!(ops[1].offset, 6);
    }

    #[test]
    fn test_wide_rejects_non_widenable() {
        let err = decode_all(&[0xC4, 0x60]).unwrap_err();
        assert!(matches!(err, BytecodeError::InvalidWide { .. }));
    }

    #[test]
    fn test_tableswitch_padding_and_targets() {
        // Offset 0: tableswitch. Payload starts at 1, padded to 4.
        let mut code = vec![0xAA, 0x00, 0x00, 0x00];
        code.extend_from_slice(&28i32.to_be_bytes()); // default -> 28
        code.extend_from_slice(&1i32.to_be_bytes()); // low
        code.extend_from_slice(&2i32.to_be_bytes()); // high
        code.extend_from_slice(&24i32.to_be_bytes()); // key 1 -> 24
        code.extend_from_slice(&26i32.to_be_bytes()); // key 2 -> 26
        code.extend_from_slice(&[0xB1, 0x00, 0xB1, 0x00, 0xB1]); // 24..28
        let ops = decode_all(&code).unwrap();
        match &ops[0].operands {
            Operands::TableSwitch {
                default,
                low,
                high,
                targets,
            } => {
                assert_eq!(*default, 28);
                assert_eq!((*low, *high), (1, 2));
                assert_eq!(targets, &vec![24, 26]);
            }
            other => panic!("unexpected operands: {other:?}"),
        }
        // Decoding resumes right after the payload.
        assert_eq!(ops[1].offset, 24);
    }

    #[test]
    fn test_tableswitch_inverted_range() {
        let mut code = vec![0xAA, 0x00, 0x00, 0x00];
        code.extend_from_slice(&16i32.to_be_bytes());
        code.extend_from_slice(&5i32.to_be_bytes()); // low
        code.extend_from_slice(&1i32.to_be_bytes()); // high < low
        code.extend_from_slice(&[0xB1; 8]);
        let err = decode_all(&code).unwrap_err();
        assert!(matches!(err, BytecodeError::MalformedSwitch(0)));
    }

    #[test]
    fn test_lookupswitch_sorted_keys_enforced() {
        let mut code = vec![0xAB, 0x00, 0x00, 0x00];
        code.extend_from_slice(&32i32.to_be_bytes()); // default
        code.extend_from_slice(&2i32.to_be_bytes()); // npairs
        code.extend_from_slice(&10i32.to_be_bytes());
        code.extend_from_slice(&28i32.to_be_bytes());
        code.extend_from_slice(&5i32.to_be_bytes()); // out of order
        code.extend_from_slice(&30i32.to_be_bytes());
        code.extend_from_slice(&[0xB1; 8]);
        let err = decode_all(&code).unwrap_err();
        assert!(matches!(err, BytecodeError::MalformedSwitch(0)));
    }

    #[test]
    fn test_reset_to_restarts_decoding() {
        let code = [0x05, 0x06, 0x60, 0xAC];
        let mut stream = InstructionStream::new(&code);
        stream.next_op().unwrap();
        stream.next_op().unwrap();
        stream.reset_to(1);
        let op = stream.next_op().unwrap().unwrap();
        assert_eq!(op.offset, 1);
        assert_eq!(op.opcode, Opcode::Iconst3);
    }

    #[test]
    fn test_invokeinterface_consumes_count_bytes() {
        let ops = decode_all(&[0xB9, 0x00, 0x07, 0x02, 0x00, 0xB1]).unwrap();
        assert_eq!(ops[0].operands, Operands::Constant(PoolIndex(7)));
        assert_eq!(ops[1].offset, 5);
    }
}
