//! Call frames for `callsub`/`retsub` and the `proto` convention

use crate::error::{Fault, FaultResult};
use crate::stack::Stack;
use crate::value::Value;

/// Bookkeeping for one active subroutine call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallFrame {
    /// Line index execution resumes at after `retsub`
    pub return_line: usize,
    /// Operand-stack height when the call was made
    pub height: usize,
    /// Set by `proto`: `retsub` trims the stack to the declared returns
    pub clear_on_return: bool,
    /// Declared argument count
    pub argc: usize,
    /// Declared return-value count
    pub retc: usize,
}

impl CallFrame {
    fn new(return_line: usize, height: usize) -> Self {
        Self {
            return_line,
            height,
            clear_on_return: false,
            argc: 0,
            retc: 0,
        }
    }
}

/// LIFO stack of call frames
#[derive(Clone, Debug, Default)]
pub struct CallStack {
    frames: Vec<CallFrame>,
}

impl CallStack {
    /// Create an empty call stack
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Record a call made at the given stack height
    pub fn call(&mut self, return_line: usize, height: usize) {
        self.frames.push(CallFrame::new(return_line, height));
    }

    /// Apply `proto argc retc` to the innermost frame
    ///
    /// The caller is responsible for checking that this directly follows the
    /// `callsub` that pushed the frame.
    pub fn declare_signature(&mut self, argc: usize, retc: usize) -> FaultResult<()> {
        let frame = self
            .frames
            .last_mut()
            .ok_or(Fault::EmptyCallStack("proto"))?;
        if frame.height < argc {
            return Err(Fault::ProtoArguments {
                argc,
                available: frame.height,
            });
        }
        frame.argc = argc;
        frame.retc = retc;
        frame.clear_on_return = true;
        Ok(())
    }

    fn slot(&self, op: &'static str, offset: i64, stack: &Stack) -> FaultResult<usize> {
        let frame = self.frames.last().ok_or(Fault::EmptyCallStack(op))?;
        if frame.clear_on_return && offset < 0 && offset.unsigned_abs() > frame.argc as u64 {
            return Err(Fault::FrameArgument {
                offset,
                argc: frame.argc,
            });
        }
        let out_of_range = |index| Fault::FrameIndex {
            index,
            len: stack.len(),
        };
        let index = (frame.height as i64)
            .checked_add(offset)
            .ok_or_else(|| out_of_range(offset))?;
        match usize::try_from(index) {
            Ok(i) if i < stack.len() => Ok(i),
            _ => Err(out_of_range(index)),
        }
    }

    /// Read the slot at `offset` from the frame height (`frame_dig`)
    ///
    /// Negative offsets address the call arguments, non-negative offsets the
    /// values the subroutine pushed.
    pub fn frame_ref(&self, offset: i64, stack: &Stack) -> FaultResult<Value> {
        let index = self.slot("frame_dig", offset, stack)?;
        stack.get(index).cloned().ok_or(Fault::StackUnderflow)
    }

    /// Pop the top value into the slot at `offset` (`frame_bury`)
    pub fn frame_set(&mut self, offset: i64, stack: &mut Stack) -> FaultResult<()> {
        let index = self.slot("frame_bury", offset, stack)?;
        if index == stack.len() - 1 {
            return Err(Fault::FrameBuryTop);
        }
        let value = stack.pop()?;
        stack.set(index, value)
    }

    /// Pop the innermost frame (`retsub`) and return the line to resume at
    ///
    /// For frames declared with `proto`, the arguments and anything the
    /// subroutine left behind are dropped; only the topmost `retc` values
    /// survive, placed where the arguments began.
    pub fn return_from_call(&mut self, stack: &mut Stack) -> FaultResult<usize> {
        let frame = self.frames.pop().ok_or(Fault::EmptyCallStack("retsub"))?;
        if frame.clear_on_return {
            let expected = frame.height + frame.retc;
            if stack.len() < expected {
                return Err(Fault::MissingReturnValues {
                    len: stack.len(),
                    expected,
                });
            }
            let returns = stack.split_off(stack.len() - frame.retc);
            stack.truncate(frame.height - frame.argc);
            stack.extend(returns);
        }
        Ok(frame.return_line)
    }

    /// Innermost frame
    pub fn current(&self) -> Option<&CallFrame> {
        self.frames.last()
    }

    /// Number of active frames
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Check if no call is active
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
