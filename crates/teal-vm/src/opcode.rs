//! Opcode table: mnemonics, categories and execution costs

macro_rules! opcodes {
    ($( $variant:ident => $mnemonic:literal, $category:ident, $cost:expr; )*) => {
        /// Mnemonics understood by the interpreter
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[allow(missing_docs)]
        pub enum Opcode {
            $( $variant, )*
        }

        impl Opcode {
            /// Every opcode, in table order
            pub const ALL: &'static [Opcode] = &[$( Opcode::$variant, )*];

            /// Look up an opcode by its mnemonic
            pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
                match mnemonic {
                    $( $mnemonic => Some(Opcode::$variant), )*
                    _ => None,
                }
            }

            /// Assembly mnemonic
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $( Opcode::$variant => $mnemonic, )*
                }
            }

            /// Opcode family
            pub fn category(self) -> Category {
                match self {
                    $( Opcode::$variant => Category::$category, )*
                }
            }

            /// Execution cost in the deployed machine's opcode budget
            ///
            /// Pseudo-ops (`int`, `byte`, `addr`) count as one constant load.
            pub fn cost(self) -> u64 {
                match self {
                    $( Opcode::$variant => $cost, )*
                }
            }
        }
    };
}

/// Opcode families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Integer arithmetic and bitwise logic
    Arithmetic,
    /// Big-integer arithmetic and comparison on byte strings
    ByteMath,
    /// `itob`/`btoi`
    Conversion,
    /// Comparisons and boolean logic
    Logic,
    /// Byte-string slicing and construction
    Bytes,
    /// Stack shaping
    Stack,
    /// Scratch space access
    Scratch,
    /// Application state, logs and transaction fields
    State,
    /// Branches, subroutines, assertions and halting
    Flow,
    /// Constant loads
    Immediate,
}

opcodes! {
    // Flow
    Err => "err", Flow, 1;
    Assert => "assert", Flow, 1;
    Return => "return", Flow, 1;
    Branch => "b", Flow, 1;
    Bnz => "bnz", Flow, 1;
    Bz => "bz", Flow, 1;
    Callsub => "callsub", Flow, 1;
    Retsub => "retsub", Flow, 1;
    Proto => "proto", Flow, 1;
    FrameDig => "frame_dig", Flow, 1;
    FrameBury => "frame_bury", Flow, 1;

    // Integer arithmetic
    Add => "+", Arithmetic, 1;
    Sub => "-", Arithmetic, 1;
    Mul => "*", Arithmetic, 1;
    Div => "/", Arithmetic, 1;
    Mod => "%", Arithmetic, 1;
    Exp => "exp", Arithmetic, 1;
    Expw => "expw", Arithmetic, 10;
    Sqrt => "sqrt", Arithmetic, 4;
    Mulw => "mulw", Arithmetic, 1;
    Addw => "addw", Arithmetic, 1;
    Divw => "divw", Arithmetic, 1;
    Divmodw => "divmodw", Arithmetic, 20;
    Bitlen => "bitlen", Arithmetic, 1;
    BitAnd => "&", Arithmetic, 1;
    BitOr => "|", Arithmetic, 1;
    BitXor => "^", Arithmetic, 1;
    BitNot => "~", Arithmetic, 1;
    Shl => "shl", Arithmetic, 1;
    Shr => "shr", Arithmetic, 1;

    // Comparison and boolean logic
    Not => "!", Logic, 1;
    Gt => ">", Logic, 1;
    Ge => ">=", Logic, 1;
    Lt => "<", Logic, 1;
    Le => "<=", Logic, 1;
    Eq => "==", Logic, 1;
    Ne => "!=", Logic, 1;
    And => "&&", Logic, 1;
    Or => "||", Logic, 1;

    // Big-integer byte math
    BAdd => "b+", ByteMath, 10;
    BSub => "b-", ByteMath, 10;
    BMul => "b*", ByteMath, 20;
    BDiv => "b/", ByteMath, 20;
    BMod => "b%", ByteMath, 20;
    BEq => "b==", ByteMath, 1;
    BNe => "b!=", ByteMath, 1;
    BLt => "b<", ByteMath, 1;
    BLe => "b<=", ByteMath, 1;
    BGt => "b>", ByteMath, 1;
    BGe => "b>=", ByteMath, 1;
    BSqrt => "bsqrt", ByteMath, 40;
    BOr => "b|", ByteMath, 6;
    BAnd => "b&", ByteMath, 6;
    BXor => "b^", ByteMath, 6;
    BNot => "b~", ByteMath, 4;

    // Conversion
    Itob => "itob", Conversion, 1;
    Btoi => "btoi", Conversion, 1;

    // Byte strings
    Concat => "concat", Bytes, 1;
    Len => "len", Bytes, 1;
    Bzero => "bzero", Bytes, 1;
    Extract => "extract", Bytes, 1;
    Extract3 => "extract3", Bytes, 1;
    ExtractUint16 => "extract_uint16", Bytes, 1;
    ExtractUint32 => "extract_uint32", Bytes, 1;
    ExtractUint64 => "extract_uint64", Bytes, 1;
    Substring => "substring", Bytes, 1;
    Substring3 => "substring3", Bytes, 1;
    Replace2 => "replace2", Bytes, 1;
    Replace3 => "replace3", Bytes, 1;
    GetByte => "getbyte", Bytes, 1;
    SetByte => "setbyte", Bytes, 1;
    GetBit => "getbit", Bytes, 1;
    SetBit => "setbit", Bytes, 1;

    // Stack shaping
    Dup => "dup", Stack, 1;
    Dup2 => "dup2", Stack, 1;
    Dupn => "dupn", Stack, 1;
    Pop => "pop", Stack, 1;
    Popn => "popn", Stack, 1;
    Swap => "swap", Stack, 1;
    Select => "select", Stack, 1;
    Cover => "cover", Stack, 1;
    Uncover => "uncover", Stack, 1;
    Dig => "dig", Stack, 1;
    Bury => "bury", Stack, 1;

    // Scratch space
    Store => "store", Scratch, 1;
    Load => "load", Scratch, 1;
    Stores => "stores", Scratch, 1;
    Loads => "loads", Scratch, 1;

    // Application state, logs, transaction
    AppGlobalGet => "app_global_get", State, 1;
    AppGlobalGetEx => "app_global_get_ex", State, 1;
    AppGlobalPut => "app_global_put", State, 1;
    AppGlobalDel => "app_global_del", State, 1;
    AppLocalGet => "app_local_get", State, 1;
    AppLocalGetEx => "app_local_get_ex", State, 1;
    AppLocalPut => "app_local_put", State, 1;
    AppLocalDel => "app_local_del", State, 1;
    Log => "log", State, 1;
    Txn => "txn", State, 1;
    Txna => "txna", State, 1;
    Txnas => "txnas", State, 1;

    // Constant loads
    Int => "int", Immediate, 1;
    PushInt => "pushint", Immediate, 1;
    Byte => "byte", Immediate, 1;
    PushBytes => "pushbytes", Immediate, 1;
    Addr => "addr", Immediate, 1;
}

impl Opcode {
    /// Whether this opcode can move the program counter somewhere other
    /// than the next line
    pub fn is_branch(self) -> bool {
        matches!(
            self,
            Opcode::Branch | Opcode::Bnz | Opcode::Bz | Opcode::Callsub | Opcode::Retsub
        )
    }

    /// Whether this opcode needs an execution context
    pub fn needs_context(self) -> bool {
        self.category() == Category::State
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}
