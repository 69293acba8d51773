//! Native-boundary argument marshaling
//!
//! A call out of managed code places arguments per the recorded
//! [`ArgLayout`]: integer and reference arguments in integer registers,
//! floats in float registers, overflow in 8-byte outgoing stack slots.
//! Spilled reference slots stay visible to the collector for the duration
//! of the callee; a collection triggered from inside the callee may
//! relocate those references, and only those.

use kestrel_jit::{ArgLayout, ArgSlot};
use kestrel_jit::callsite::{FLOAT_ARG_REGS, INT_ARG_REGS};
use kestrel_bytecode::ValueType;

use crate::error::{Result, RuntimeError};
use crate::value::RuntimeValue;

/// The materialized outgoing-argument area of one native call
#[derive(Debug, Clone, PartialEq)]
pub struct NativeCallArea {
    int_regs: Vec<u64>,
    float_regs: Vec<u64>,
    stack: Vec<u64>,
    /// Stack slots holding references, from the layout
    ref_slots: Vec<u16>,
}

impl NativeCallArea {
    /// Place `args` according to `layout`. Arity and per-argument types
    /// must match the recorded signature exactly.
    pub fn marshal(layout: &ArgLayout, args: &[RuntimeValue]) -> Result<Self> {
        if args.len() != layout.args.len() {
            return Err(RuntimeError::ArgumentMismatch {
                index: args.len().min(layout.args.len()),
                reason: format!(
                    "layout has {} arguments, got {}",
                    layout.args.len(),
                    args.len()
                ),
            });
        }
        let mut area = Self {
            int_regs: vec![0; INT_ARG_REGS as usize],
            float_regs: vec![0; FLOAT_ARG_REGS as usize],
            stack: vec![0; layout.stack_slots() as usize],
            ref_slots: layout.spilled_refs().collect(),
        };
        for (index, (&(ty, slot), &value)) in layout.args.iter().zip(args).enumerate() {
            let got = value.value_type();
            let matches = got == ty
                || (ty == ValueType::Reference && got == ValueType::ReturnAddress);
            if !matches {
                return Err(RuntimeError::ArgumentMismatch {
                    index,
                    reason: format!("expected {ty}, got {got}"),
                });
            }
            let bits = value.bits();
            match slot {
                ArgSlot::IntReg(r) => area.int_regs[r as usize] = bits,
                ArgSlot::FloatReg(r) => area.float_regs[r as usize] = bits,
                ArgSlot::Stack(s) => area.stack[s as usize] = bits,
            }
        }
        Ok(area)
    }

    /// Raw bits of an integer register
    pub fn int_reg(&self, r: u8) -> Option<u64> {
        self.int_regs.get(r as usize).copied()
    }

    /// Raw bits of a float register
    pub fn float_reg(&self, r: u8) -> Option<u64> {
        self.float_regs.get(r as usize).copied()
    }

    /// Raw bits of an outgoing stack slot
    pub fn stack_slot(&self, s: u16) -> Option<u64> {
        self.stack.get(s as usize).copied()
    }

    /// Spilled reference slots and their current handles; the roots a
    /// collection running under the callee must trace.
    pub fn stack_roots(&self) -> impl Iterator<Item = (u16, u64)> + '_ {
        self.ref_slots
            .iter()
            .map(|&s| (s, self.stack[s as usize]))
    }

    /// Rewrite one spilled reference after the collector moved its target.
    /// Only slots the layout marked as references may be rewritten.
    pub fn relocate_root(&mut self, slot: u16, new_handle: u64) -> Result<()> {
        if !self.ref_slots.contains(&slot) {
            return Err(RuntimeError::SlotOutOfRange(slot));
        }
        self.stack[slot as usize] = new_handle;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_bytecode::ValueType;

    #[test]
    fn test_marshal_registers_and_stack() {
        let layout = ArgLayout::assign(&[ValueType::Int; 9]);
        let args: Vec<RuntimeValue> = (0..9).map(RuntimeValue::Int).collect();
        let area = NativeCallArea::marshal(&layout, &args).unwrap();
        for r in 0..INT_ARG_REGS {
            assert_eq!(area.int_reg(r), Some(u64::from(r)));
        }
        for s in 0..3u16 {
            assert_eq!(area.stack_slot(s), Some(u64::from(s) + 6));
        }
    }

    #[test]
    fn test_arity_mismatch() {
        let layout = ArgLayout::assign(&[ValueType::Int, ValueType::Int]);
        let err = NativeCallArea::marshal(&layout, &[RuntimeValue::Int(1)]).unwrap_err();
        assert!(matches!(err, RuntimeError::ArgumentMismatch { .. }));
    }

    #[test]
    fn test_type_mismatch() {
        let layout = ArgLayout::assign(&[ValueType::Float]);
        let err =
            NativeCallArea::marshal(&layout, &[RuntimeValue::Int(1)]).unwrap_err();
        assert!(matches!(err, RuntimeError::ArgumentMismatch { index: 0, .. }));
    }

    #[test]
    fn test_stack_roots_are_only_references() {
        let mut sig = vec![ValueType::Int; 6];
        sig.push(ValueType::Reference);
        sig.push(ValueType::Int);
        sig.push(ValueType::Reference);
        let layout = ArgLayout::assign(&sig);
        let mut args: Vec<RuntimeValue> = (0..6).map(RuntimeValue::Int).collect();
        args.push(RuntimeValue::Reference(0xA000));
        args.push(RuntimeValue::Int(7));
        args.push(RuntimeValue::Reference(0xB000));
        let area = NativeCallArea::marshal(&layout, &args).unwrap();
        let roots: Vec<(u16, u64)> = area.stack_roots().collect();
        assert_eq!(roots, vec![(0, 0xA000), (2, 0xB000)]);
    }

    #[test]
    fn test_relocate_rejects_non_reference_slot() {
        let mut sig = vec![ValueType::Int; 6];
        sig.push(ValueType::Int);
        let layout = ArgLayout::assign(&sig);
        let args: Vec<RuntimeValue> = (0..7).map(RuntimeValue::Int).collect();
        let mut area = NativeCallArea::marshal(&layout, &args).unwrap();
        assert_eq!(
            area.relocate_root(0, 0xC000),
            Err(RuntimeError::SlotOutOfRange(0))
        );
    }
}
