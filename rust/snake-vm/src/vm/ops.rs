//! Instruction implementations. Every operation validates its operands
//! against the stack before consuming anything.

use super::{operand, Frame, Step, VmError, VM};
use snake_compiler::compile_literal;
use snake_core::lir::{Instruction, OpCode};
use snake_core::types::{Type, TypeMismatch, TypeTag};
use snake_core::values::{order, share_type, structural_equal, ListValue, Value};
use std::io::{BufRead, Write};

fn expect_number(value: &Value) -> Result<f64, VmError> {
    value
        .as_number()
        .ok_or_else(|| TypeMismatch::new(&Type::Number, &value.ty()).into())
}

fn expect_bool(value: &Value) -> Result<bool, VmError> {
    value
        .as_bool()
        .ok_or_else(|| TypeMismatch::new(&Type::Boolean, &value.ty()).into())
}

fn expect_list(value: &Value) -> Result<ListValue, VmError> {
    match value.resolved() {
        Value::List(list) => Ok(list),
        other => Err(TypeMismatch::tag(TypeTag::List, &other.ty()).into()),
    }
}

/// A list position: integral and below `len` (or equal to it when `allow_end`).
fn expect_index(value: &Value, len: usize, allow_end: bool) -> Result<usize, VmError> {
    let index = expect_number(value)?;
    let limit = if allow_end { len } else { len.saturating_sub(1) };
    let in_range = index.fract() == 0.0
        && index >= 0.0
        && (index as usize) <= limit
        && (allow_end || len > 0);
    if !in_range {
        return Err(VmError::IndexOutOfRange { index, len });
    }
    Ok(index as usize)
}

/// Composites hold values, never live binders.
fn expect_bound(value: &Value) -> Result<(), VmError> {
    match value.resolved() {
        Value::Var(unbound) => Err(VmError::UnboundVariable(unbound.name())),
        _ => Ok(()),
    }
}

fn malformed(op: OpCode, reason: impl Into<String>) -> VmError {
    VmError::MalformedInstruction {
        op,
        reason: reason.into(),
    }
}

impl<'io> VM<'io> {
    // ── Literal pushes ──

    pub(super) fn push_number(&mut self, instr: &Instruction) -> Result<Step, VmError> {
        let text = operand(instr)?;
        let n: f64 = text
            .parse()
            .map_err(|_| malformed(instr.op, format!("invalid number '{}'", text)))?;
        self.frame_mut()?.push(Value::Number(n));
        Ok(Step::Next)
    }

    pub(super) fn push_char(&mut self, instr: &Instruction) -> Result<Step, VmError> {
        let text = operand(instr)?;
        let mut chars = text.chars();
        let c = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => return Err(malformed(instr.op, format!("'{}' is not one character", text))),
        };
        self.frame_mut()?.push(Value::Character(c));
        Ok(Step::Next)
    }

    pub(super) fn push_bool(&mut self, instr: &Instruction) -> Result<Step, VmError> {
        let b = match operand(instr)? {
            "true" => true,
            "false" => false,
            other => return Err(malformed(instr.op, format!("invalid boolean '{}'", other))),
        };
        self.frame_mut()?.push(Value::Boolean(b));
        Ok(Step::Next)
    }

    // ── Construction ──

    /// Collect the run of values sharing the top's flattened type into a list,
    /// top of stack first.
    pub(super) fn aggregate(&mut self) -> Result<Step, VmError> {
        let frame = self.frame_mut()?;
        let top = frame.operands(OpCode::Aggregate, 1)?[0].clone();
        expect_bound(&top)?;
        let tags = top.flatten();
        let run = frame
            .stack
            .iter()
            .rev()
            .take_while(|v| v.flatten() == tags)
            .count();
        let items: Vec<Value> = frame
            .take(run)
            .into_iter()
            .rev()
            .map(Value::into_resolved)
            .collect();
        frame.push(Value::list(top.ty(), items));
        Ok(Step::Next)
    }

    pub(super) fn make_tuple(&mut self) -> Result<Step, VmError> {
        let frame = self.frame_mut()?;
        for value in frame.operands(OpCode::MakeTuple, 2)? {
            expect_bound(value)?;
        }
        let first = frame.take(1).remove(0).into_resolved();
        let second = frame.take(1).remove(0).into_resolved();
        frame.push(Value::tuple(first, second));
        Ok(Step::Next)
    }

    // ── Arithmetic and logic ──

    pub(super) fn arithmetic(
        &mut self,
        op: OpCode,
        f: fn(f64, f64) -> f64,
    ) -> Result<Step, VmError> {
        let frame = self.frame_mut()?;
        let (left, right) = {
            let args = frame.operands(op, 2)?;
            (expect_number(&args[0])?, expect_number(&args[1])?)
        };
        frame.take(2);
        frame.push(Value::Number(f(left, right)));
        Ok(Step::Next)
    }

    pub(super) fn compare(&mut self, op: OpCode) -> Result<Step, VmError> {
        let frame = self.frame_mut()?;
        let result = {
            let args = frame.operands(op, 2)?;
            let (left, right) = (&args[0], &args[1]);
            if !share_type(left, right) {
                return Err(TypeMismatch::new(&left.ty(), &right.ty()).into());
            }
            match op {
                OpCode::Equal => structural_equal(left, right),
                OpCode::Greater => order(left, right) > 0,
                _ => order(left, right) < 0,
            }
        };
        frame.take(2);
        frame.push(Value::Boolean(result));
        Ok(Step::Next)
    }

    pub(super) fn logic(
        &mut self,
        op: OpCode,
        f: fn(bool, bool) -> bool,
    ) -> Result<Step, VmError> {
        let frame = self.frame_mut()?;
        let (left, right) = {
            let args = frame.operands(op, 2)?;
            (expect_bool(&args[0])?, expect_bool(&args[1])?)
        };
        frame.take(2);
        frame.push(Value::Boolean(f(left, right)));
        Ok(Step::Next)
    }

    pub(super) fn not(&mut self) -> Result<Step, VmError> {
        let frame = self.frame_mut()?;
        let b = expect_bool(&frame.operands(OpCode::Not, 1)?[0])?;
        frame.take(1);
        frame.push(Value::Boolean(!b));
        Ok(Step::Next)
    }

    pub(super) fn round(&mut self) -> Result<Step, VmError> {
        let frame = self.frame_mut()?;
        let n = expect_number(&frame.operands(OpCode::Round, 1)?[0])?;
        frame.take(1);
        frame.push(Value::Number(n.round_ties_even()));
        Ok(Step::Next)
    }

    pub(super) fn to_char(&mut self) -> Result<Step, VmError> {
        let frame = self.frame_mut()?;
        let n = expect_number(&frame.operands(OpCode::ToChar, 1)?[0])?;
        let c = if n.fract() == 0.0 && n >= 0.0 && n <= u32::MAX as f64 {
            char::from_u32(n as u32)
        } else {
            None
        };
        let c = c.ok_or(VmError::InvalidCharCode(n))?;
        frame.take(1);
        frame.push(Value::Character(c));
        Ok(Step::Next)
    }

    // ── Lists and tuples ──

    pub(super) fn concat(&mut self) -> Result<Step, VmError> {
        let frame = self.frame_mut()?;
        let (mut left, right) = {
            let args = frame.operands(OpCode::Concat, 2)?;
            let left = expect_list(&args[0])?;
            let right = expect_list(&args[1])?;
            if !share_type(&args[0], &args[1]) {
                return Err(TypeMismatch::new(&args[0].ty(), &args[1].ty()).into());
            }
            (left, right)
        };
        frame.take(2);
        left.items.extend(right.items);
        frame.push(Value::List(left));
        Ok(Step::Next)
    }

    /// `list index --` → `shortened removed`
    pub(super) fn remove_at(&mut self) -> Result<Step, VmError> {
        let frame = self.frame_mut()?;
        let (mut list, index) = {
            let args = frame.operands(OpCode::RemoveAt, 2)?;
            let list = expect_list(&args[0])?;
            let index = expect_index(&args[1], list.items.len(), false)?;
            (list, index)
        };
        frame.take(2);
        let removed = list.items.remove(index);
        frame.push(Value::List(list));
        frame.push(removed);
        Ok(Step::Next)
    }

    /// `list item index @@` → `list'`
    pub(super) fn insert_at(&mut self) -> Result<Step, VmError> {
        let frame = self.frame_mut()?;
        let (mut list, index) = {
            let args = frame.operands(OpCode::InsertAt, 3)?;
            let list = expect_list(&args[0])?;
            expect_bound(&args[1])?;
            let item_ty = args[1].ty();
            if !item_ty.matches(&list.elem) {
                return Err(TypeMismatch::new(&list.elem, &item_ty).into());
            }
            let index = expect_index(&args[2], list.items.len(), true)?;
            (list, index)
        };
        let item = frame.take(3).swap_remove(1).into_resolved();
        list.items.insert(index, item);
        frame.push(Value::List(list));
        Ok(Step::Next)
    }

    /// Inverse of make-tuple for tuples and of aggregate for lists: the first
    /// item ends up on top.
    pub(super) fn unzip(&mut self) -> Result<Step, VmError> {
        let frame = self.frame_mut()?;
        let value = frame.operands(OpCode::Unzip, 1)?[0].resolved();
        match value {
            Value::Tuple(first, second) => {
                frame.take(1);
                frame.push(*second);
                frame.push(*first);
            }
            Value::List(list) => {
                frame.take(1);
                frame.stack.extend(list.items.into_iter().rev());
            }
            other => return Err(TypeMismatch::tag(TypeTag::Tuple, &other.ty()).into()),
        }
        Ok(Step::Next)
    }

    // ── I/O ──

    pub(super) fn print(&mut self) -> Result<Step, VmError> {
        let frame = self.frame_mut()?;
        frame.operands(OpCode::Print, 1)?;
        let value = frame.take(1).remove(0);
        write!(self.output, "{}", value)?;
        self.output.flush()?;
        Ok(Step::Next)
    }

    /// Read one line without its terminator. End of input reads as empty.
    pub(super) fn input(&mut self) -> Result<Step, VmError> {
        self.output.flush()?;
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        let trimmed = line.strip_suffix('\n').unwrap_or(&line);
        let trimmed = trimmed.strip_suffix('\r').unwrap_or(trimmed);
        let value = Value::string(trimmed);
        self.frame_mut()?.push(value);
        Ok(Step::Next)
    }

    /// Parse a character list as a single literal and build it in this frame.
    pub(super) fn parse_str(&mut self) -> Result<Step, VmError> {
        let text = {
            let frame = self.frame_mut()?;
            let top = &frame.operands(OpCode::ParseStr, 1)?[0];
            let text = top
                .as_string()
                .ok_or_else(|| TypeMismatch::new(&Type::string(), &top.ty()))?;
            frame.take(1);
            text
        };
        let code = compile_literal(&text).map_err(|err| VmError::MalformedLiteralInput {
            text: text.clone(),
            reason: err.to_string(),
        })?;
        for instr in &code {
            self.execute(instr)?;
        }
        Ok(Step::Next)
    }

    // ── Variables and control flow ──

    /// `target value =`: bind in place. The first binding fixes the type.
    pub(super) fn assign(&mut self) -> Result<Step, VmError> {
        let frame = self.frame_mut()?;
        let (target, value) = {
            let args = frame.operands(OpCode::Assign, 2)?;
            let target = match &args[0] {
                Value::Var(var) => var.clone(),
                other => return Err(TypeMismatch::tag(TypeTag::Var, &other.ty()).into()),
            };
            expect_bound(&args[1])?;
            (target, args[1].resolved())
        };
        target.bind(value)?;
        frame.take(2);
        Ok(Step::Next)
    }

    pub(super) fn call(&mut self, name: &str) -> Result<Step, VmError> {
        let callee = self
            .functions
            .get(name)
            .ok_or_else(|| VmError::UnresolvedCall(name.to_string()))?
            .clone();
        if let Some(max) = self.options.max_call_depth {
            if self.call_stack.len() >= max {
                return Err(VmError::CallDepthExceeded(max));
            }
        }
        let frame = self.frame_mut()?;
        {
            let arg = &frame.operands(OpCode::Call, 1)?[0];
            let arg_ty = arg.ty();
            if !arg_ty.matches(&callee.input) {
                return Err(TypeMismatch::new(&callee.input, &arg_ty).into());
            }
        }
        let arg = frame.take(1).remove(0).into_resolved();
        Ok(Step::Call(Frame::call(&callee, arg)))
    }

    pub(super) fn ret(&mut self) -> Result<Step, VmError> {
        let frame = self.frame_mut()?;
        {
            let value = &frame.operands(OpCode::Return, 1)?[0];
            if let Some(expected) = &frame.return_type {
                let actual = value.ty();
                if !actual.matches(expected) {
                    return Err(TypeMismatch::new(expected, &actual).into());
                }
            }
        }
        let value = frame.take(1).remove(0).into_resolved();
        Ok(Step::Return(value))
    }

    /// Pop the condition; when false, skip past the matching loop end.
    pub(super) fn while_start(&mut self, label: &str) -> Result<Step, VmError> {
        let frame = self.frame_mut()?;
        let cond = expect_bool(&frame.operands(OpCode::WhileStart, 1)?[0])?;
        frame.take(1);
        if cond {
            return Ok(Step::Next);
        }
        frame
            .find_loop_end(label)
            .map(|end| Step::Jump(end + 1))
            .ok_or_else(|| VmError::MalformedJump(label.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snake_core::lir::Module;
    use std::io;

    fn vm_with(stack: Vec<Value>) -> VM<'static> {
        let mut vm = VM::new(Module::default(), io::empty(), io::sink());
        if let Some(frame) = vm.current.as_mut() {
            frame.stack = stack;
        }
        vm
    }

    fn nums(xs: &[f64]) -> Value {
        Value::list(Type::Number, xs.iter().map(|x| Value::Number(*x)).collect())
    }

    #[test]
    fn test_aggregate_stops_at_type_change() {
        let mut vm = vm_with(vec![
            Value::Number(1.0),
            Value::Number(2.0),
            Value::Character('a'),
        ]);
        vm.aggregate().unwrap();
        assert_eq!(
            vm.stack(),
            &[
                Value::Number(1.0),
                Value::Number(2.0),
                Value::list(Type::Character, vec![Value::Character('a')]),
            ]
        );
    }

    #[test]
    fn test_aggregate_preserves_top_first_order() {
        let mut vm = vm_with(vec![Value::Number(3.0), Value::Number(2.0), Value::Number(1.0)]);
        vm.aggregate().unwrap();
        assert_eq!(vm.stack(), &[nums(&[1.0, 2.0, 3.0])]);
    }

    #[test]
    fn test_make_tuple_top_is_first() {
        let mut vm = vm_with(vec![Value::Boolean(true), Value::Number(1.0)]);
        vm.make_tuple().unwrap();
        assert_eq!(
            vm.stack(),
            &[Value::tuple(Value::Number(1.0), Value::Boolean(true))]
        );
        vm.unzip().unwrap();
        assert_eq!(vm.stack(), &[Value::Boolean(true), Value::Number(1.0)]);
    }

    #[test]
    fn test_unzip_list_puts_first_on_top() {
        let mut vm = vm_with(vec![nums(&[1.0, 2.0])]);
        vm.unzip().unwrap();
        assert_eq!(vm.stack(), &[Value::Number(2.0), Value::Number(1.0)]);
    }

    #[test]
    fn test_concat_requires_same_list_type() {
        let mut vm = vm_with(vec![nums(&[1.0]), nums(&[2.0, 3.0])]);
        vm.concat().unwrap();
        assert_eq!(vm.stack(), &[nums(&[1.0, 2.0, 3.0])]);

        let mut vm = vm_with(vec![nums(&[1.0]), Value::string("x")]);
        assert!(matches!(vm.concat(), Err(VmError::TypeMismatch(_))));
        assert_eq!(vm.stack().len(), 2);
    }

    #[test]
    fn test_remove_at_pushes_removed_on_top() {
        let mut vm = vm_with(vec![nums(&[1.0, 2.0, 3.0]), Value::Number(1.0)]);
        vm.remove_at().unwrap();
        assert_eq!(vm.stack(), &[nums(&[1.0, 3.0]), Value::Number(2.0)]);
    }

    #[test]
    fn test_remove_at_out_of_range() {
        let mut vm = vm_with(vec![nums(&[1.0]), Value::Number(1.0)]);
        assert!(matches!(
            vm.remove_at(),
            Err(VmError::IndexOutOfRange { len: 1, .. })
        ));
        let mut vm = vm_with(vec![nums(&[]), Value::Number(0.0)]);
        assert!(vm.remove_at().is_err());
        let mut vm = vm_with(vec![nums(&[1.0, 2.0]), Value::Number(0.5)]);
        assert!(vm.remove_at().is_err());
    }

    #[test]
    fn test_insert_at_end_and_type_check() {
        let mut vm = vm_with(vec![nums(&[1.0]), Value::Number(2.0), Value::Number(1.0)]);
        vm.insert_at().unwrap();
        assert_eq!(vm.stack(), &[nums(&[1.0, 2.0])]);

        let mut vm = vm_with(vec![nums(&[1.0]), Value::Character('a'), Value::Number(0.0)]);
        assert!(matches!(vm.insert_at(), Err(VmError::TypeMismatch(_))));
        assert_eq!(vm.stack().len(), 3);
    }

    #[test]
    fn test_compare_uses_weak_ordering() {
        let mut vm = vm_with(vec![nums(&[2.0, 1.0]), nums(&[1.0, 2.0])]);
        vm.compare(OpCode::Greater).unwrap();
        assert_eq!(vm.stack(), &[Value::Boolean(false)]);

        let mut vm = vm_with(vec![Value::Character('b'), Value::Character('a')]);
        vm.compare(OpCode::Greater).unwrap();
        assert_eq!(vm.stack(), &[Value::Boolean(true)]);

        let mut vm = vm_with(vec![Value::Number(1.0), Value::Character('a')]);
        assert!(matches!(vm.compare(OpCode::Equal), Err(VmError::TypeMismatch(_))));
    }

    #[test]
    fn test_round_half_to_even() {
        for (input, expected) in [(2.5, 2.0), (3.5, 4.0), (-0.5, -0.0), (1.2, 1.0)] {
            let mut vm = vm_with(vec![Value::Number(input)]);
            vm.round().unwrap();
            assert_eq!(vm.stack(), &[Value::Number(expected)]);
        }
    }

    #[test]
    fn test_to_char() {
        let mut vm = vm_with(vec![Value::Number(65.0)]);
        vm.to_char().unwrap();
        assert_eq!(vm.stack(), &[Value::Character('A')]);

        for bad in [-1.0, 65.5, 55296.0] {
            let mut vm = vm_with(vec![Value::Number(bad)]);
            assert!(matches!(vm.to_char(), Err(VmError::InvalidCharCode(_))));
        }
    }

    #[test]
    fn test_assign_from_unbound_var() {
        let mut vm = vm_with(vec![]);
        if let Some(frame) = vm.current.as_mut() {
            let x = frame.var("x");
            let y = frame.var("y");
            frame.stack = vec![Value::Var(x), Value::Var(y)];
        }
        assert!(matches!(vm.assign(), Err(VmError::UnboundVariable(name)) if name == "y"));
    }

    #[test]
    fn test_composites_reject_unbound_vars() {
        let mut vm = vm_with(vec![]);
        if let Some(frame) = vm.current.as_mut() {
            let y = frame.var("y");
            frame.stack = vec![Value::Number(1.0), Value::Var(y)];
        }
        assert!(matches!(vm.make_tuple(), Err(VmError::UnboundVariable(name)) if name == "y"));
        assert!(matches!(vm.aggregate(), Err(VmError::UnboundVariable(_))));
        assert_eq!(vm.stack().len(), 2);

        let mut vm = vm_with(vec![]);
        if let Some(frame) = vm.current.as_mut() {
            let z = frame.var("z");
            frame.stack = vec![nums(&[1.0]), Value::Var(z), Value::Number(0.0)];
        }
        assert!(matches!(vm.insert_at(), Err(VmError::UnboundVariable(name)) if name == "z"));
        assert_eq!(vm.stack().len(), 3);
    }

    #[test]
    fn test_assign_requires_var_target() {
        let mut vm = vm_with(vec![Value::Number(1.0), Value::Number(2.0)]);
        match vm.assign() {
            Err(VmError::TypeMismatch(err)) => assert_eq!(err.expected, vec![TypeTag::Var]),
            other => panic!("expected type mismatch, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_parse_str_builds_literal() {
        let mut vm = vm_with(vec![Value::string("[1 2]")]);
        vm.parse_str().unwrap();
        assert_eq!(vm.stack(), &[nums(&[1.0, 2.0])]);

        let mut vm = vm_with(vec![Value::string("(1 'a')")]);
        vm.parse_str().unwrap();
        assert_eq!(
            vm.stack(),
            &[Value::tuple(Value::Number(1.0), Value::Character('a'))]
        );
    }

    #[test]
    fn test_parse_str_rejects_statements() {
        let mut vm = vm_with(vec![Value::string("1 2 +")]);
        match vm.parse_str() {
            Err(VmError::MalformedLiteralInput { text, .. }) => assert_eq!(text, "1 2 +"),
            other => panic!("expected malformed literal, got {:?}", other.map(|_| ())),
        }
        let mut vm = vm_with(vec![Value::Number(1.0)]);
        assert!(matches!(vm.parse_str(), Err(VmError::TypeMismatch(_))));
    }

    #[test]
    fn test_input_strips_line_ending() {
        let mut vm = VM::new(Module::default(), io::Cursor::new("hello\r\nworld"), io::sink());
        vm.input().unwrap();
        vm.input().unwrap();
        vm.input().unwrap();
        assert_eq!(
            vm.stack(),
            &[Value::string("hello"), Value::string("world"), Value::string("")]
        );
    }
}
