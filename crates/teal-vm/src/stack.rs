//! Operand stack

use crate::error::{Fault, FaultResult};
use crate::value::Value;
use std::fmt;

/// Operand stack of tagged values (last-in-first-out, unbounded)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stack {
    data: Vec<Value>,
}

impl Stack {
    /// Create a new empty stack
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Push a value onto the stack
    pub fn push(&mut self, value: impl Into<Value>) {
        self.data.push(value.into());
    }

    /// Pop a value from the stack
    pub fn pop(&mut self) -> FaultResult<Value> {
        self.data.pop().ok_or(Fault::StackUnderflow)
    }

    /// Pop an integer
    pub fn pop_uint(&mut self) -> FaultResult<u64> {
        self.pop()?.as_uint()
    }

    /// Pop a byte string
    pub fn pop_bytes(&mut self) -> FaultResult<Vec<u8>> {
        self.pop()?.into_bytes()
    }

    /// Peek at the top of the stack
    pub fn peek(&self) -> FaultResult<&Value> {
        self.data.last().ok_or(Fault::StackUnderflow)
    }

    /// Peek at a specific depth (0 = top)
    pub fn peek_at(&self, depth: usize) -> FaultResult<&Value> {
        if depth >= self.data.len() {
            return Err(Fault::StackUnderflow);
        }
        Ok(&self.data[self.data.len() - 1 - depth])
    }

    /// Duplicate the top value
    pub fn dup(&mut self) -> FaultResult<()> {
        let top = self.peek()?.clone();
        self.data.push(top);
        Ok(())
    }

    /// Duplicate the top two values, preserving their order
    pub fn dup2(&mut self) -> FaultResult<()> {
        let len = self.data.len();
        if len < 2 {
            return Err(Fault::StackUnderflow);
        }
        self.data.extend_from_within(len - 2..);
        Ok(())
    }

    /// Push `n` more copies of the top value
    pub fn dupn(&mut self, n: usize) -> FaultResult<()> {
        let top = self.peek()?.clone();
        self.data.extend(std::iter::repeat(top).take(n));
        Ok(())
    }

    /// Swap the top two values
    pub fn swap(&mut self) -> FaultResult<()> {
        let len = self.data.len();
        if len < 2 {
            return Err(Fault::StackUnderflow);
        }
        self.data.swap(len - 1, len - 2);
        Ok(())
    }

    /// Push a copy of the value at `depth` (0 = top)
    pub fn dig(&mut self, depth: usize) -> FaultResult<()> {
        let value = self
            .peek_at(depth)
            .map_err(|_| self.too_shallow("dig", depth))?
            .clone();
        self.data.push(value);
        Ok(())
    }

    /// Move the top value down so that `depth` values sit above it
    pub fn cover(&mut self, depth: usize) -> FaultResult<()> {
        let len = self.data.len();
        if len == 0 {
            return Err(Fault::StackUnderflow);
        }
        if depth >= len {
            return Err(self.too_shallow("cover", depth));
        }
        let top = self.data.remove(len - 1);
        self.data.insert(len - 1 - depth, top);
        Ok(())
    }

    /// Move the value at `depth` to the top
    pub fn uncover(&mut self, depth: usize) -> FaultResult<()> {
        let len = self.data.len();
        if depth >= len {
            return Err(self.too_shallow("uncover", depth));
        }
        let value = self.data.remove(len - 1 - depth);
        self.data.push(value);
        Ok(())
    }

    /// Pop the top value and store it at `depth` counted before the pop
    pub fn bury(&mut self, depth: usize) -> FaultResult<()> {
        let len = self.data.len();
        if depth == 0 || depth >= len {
            return Err(self.too_shallow("bury", depth));
        }
        let top = self.pop()?;
        self.data[len - 1 - depth] = top;
        Ok(())
    }

    /// Pop `n` values
    pub fn popn(&mut self, n: usize) -> FaultResult<()> {
        if n > self.data.len() {
            return Err(Fault::StackUnderflow);
        }
        self.data.truncate(self.data.len() - n);
        Ok(())
    }

    /// Value at absolute index (0 = bottom)
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.data.get(index)
    }

    /// Overwrite the value at absolute index (0 = bottom)
    pub fn set(&mut self, index: usize, value: Value) -> FaultResult<()> {
        let slot = self.data.get_mut(index).ok_or(Fault::StackUnderflow)?;
        *slot = value;
        Ok(())
    }

    /// Remove and return everything above absolute index `at`
    pub fn split_off(&mut self, at: usize) -> Vec<Value> {
        self.data.split_off(at.min(self.data.len()))
    }

    /// Drop everything above absolute index `len`
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }

    /// Append values in order
    pub fn extend(&mut self, values: impl IntoIterator<Item = Value>) {
        self.data.extend(values);
    }

    /// Get current stack size
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if stack is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Clear the stack
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Values from bottom to top
    pub fn as_slice(&self) -> &[Value] {
        &self.data
    }

    /// Consume into a vector, bottom first
    pub fn into_vec(self) -> Vec<Value> {
        self.data
    }

    fn too_shallow(&self, op: &'static str, depth: usize) -> Fault {
        Fault::StackTooShallow {
            op,
            depth,
            len: self.data.len(),
        }
    }
}

impl From<Vec<Value>> for Stack {
    fn from(data: Vec<Value>) -> Self {
        Self { data }
    }
}

/// Renders as `[1, 0x6b]`, the snapshot written to trace sinks
impl fmt::Display for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, value) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack_of(values: &[u64]) -> Stack {
        Stack::from(values.iter().map(|&v| Value::Uint(v)).collect::<Vec<_>>())
    }

    fn uints(stack: &Stack) -> Vec<u64> {
        stack.as_slice().iter().map(|v| v.as_uint().unwrap()).collect()
    }

    #[test]
    fn test_push_pop() {
        let mut stack = Stack::new();
        stack.push(1u64);
        stack.push("k");
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.pop().unwrap(), Value::from("k"));
        assert_eq!(stack.pop_uint().unwrap(), 1);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_pop_empty_fails_loudly() {
        let mut stack = Stack::new();
        assert_eq!(stack.pop(), Err(Fault::StackUnderflow));
        assert_eq!(stack.peek(), Err(Fault::StackUnderflow));
    }

    #[test]
    fn test_pop_typed() {
        let mut stack = Stack::new();
        stack.push("x");
        assert!(stack.pop_uint().is_err());
        stack.push(3u64);
        assert!(stack.pop_bytes().is_err());
    }

    #[test]
    fn test_peek_at() {
        let stack = stack_of(&[1, 2, 3]);
        assert_eq!(stack.peek_at(0).unwrap(), &Value::Uint(3));
        assert_eq!(stack.peek_at(2).unwrap(), &Value::Uint(1));
        assert!(stack.peek_at(3).is_err());
    }

    // ==================== Shaping ====================

    #[test]
    fn test_dup_dup2() {
        let mut stack = stack_of(&[1, 2]);
        stack.dup().unwrap();
        assert_eq!(uints(&stack), vec![1, 2, 2]);
        stack.dup2().unwrap();
        assert_eq!(uints(&stack), vec![1, 2, 2, 2, 2]);

        let mut stack = stack_of(&[1, 2]);
        stack.dup2().unwrap();
        assert_eq!(uints(&stack), vec![1, 2, 1, 2]);
        assert!(stack_of(&[1]).dup2().is_err());
    }

    #[test]
    fn test_dupn() {
        let mut stack = stack_of(&[7]);
        stack.dupn(3).unwrap();
        assert_eq!(uints(&stack), vec![7, 7, 7, 7]);
    }

    #[test]
    fn test_swap() {
        let mut stack = stack_of(&[1, 2]);
        stack.swap().unwrap();
        assert_eq!(uints(&stack), vec![2, 1]);
        assert!(stack_of(&[1]).swap().is_err());
    }

    #[test]
    fn test_cover() {
        let mut stack = stack_of(&[1, 2, 3, 4]);
        stack.cover(2).unwrap();
        assert_eq!(uints(&stack), vec![1, 4, 2, 3]);

        let mut stack = stack_of(&[1, 2]);
        stack.cover(0).unwrap();
        assert_eq!(uints(&stack), vec![1, 2]);

        let mut stack = stack_of(&[1, 2]);
        assert_eq!(
            stack.cover(2),
            Err(Fault::StackTooShallow { op: "cover", depth: 2, len: 2 })
        );
    }

    #[test]
    fn test_uncover() {
        let mut stack = stack_of(&[1, 2, 3, 4]);
        stack.uncover(2).unwrap();
        assert_eq!(uints(&stack), vec![1, 3, 4, 2]);
        assert!(stack.uncover(4).is_err());
    }

    #[test]
    fn test_dig() {
        let mut stack = stack_of(&[1, 2, 3]);
        stack.dig(2).unwrap();
        assert_eq!(uints(&stack), vec![1, 2, 3, 1]);
        assert!(stack.dig(4).is_err());
    }

    #[test]
    fn test_bury() {
        let mut stack = stack_of(&[1, 2, 3, 9]);
        stack.bury(3).unwrap();
        assert_eq!(uints(&stack), vec![9, 2, 3]);
        assert!(stack.bury(0).is_err());
        assert!(stack.bury(3).is_err());
    }

    #[test]
    fn test_popn() {
        let mut stack = stack_of(&[1, 2, 3]);
        stack.popn(2).unwrap();
        assert_eq!(uints(&stack), vec![1]);
        assert_eq!(stack.popn(2), Err(Fault::StackUnderflow));
    }

    #[test]
    fn test_split_off_and_truncate() {
        let mut stack = stack_of(&[1, 2, 3, 4]);
        let top = stack.split_off(3);
        assert_eq!(top, vec![Value::Uint(4)]);
        stack.truncate(1);
        stack.extend(top);
        assert_eq!(uints(&stack), vec![1, 4]);
    }

    #[test]
    fn test_display_snapshot() {
        let mut stack = stack_of(&[8]);
        stack.push("k");
        assert_eq!(stack.to_string(), "[8, 0x6b]");
        assert_eq!(Stack::new().to_string(), "[]");
    }
}
