use std::error;
use std::fmt;

/// Why a type signature was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureError {
    kind: SignatureErrorKind,
}

impl SignatureError {
    #[inline]
    pub(super) const fn new(kind: SignatureErrorKind) -> Self {
        Self { kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum SignatureErrorKind {
    Empty,
    UnknownTypeCode(char),
    SignatureTooLong,
    NotSingleCompleteType,
    MissingArrayElementType,
    StructEndedButNotStarted,
    DictEndedButNotStarted,
    StructStartedButNotEnded,
    DictStartedButNotEnded,
    StructHasNoFields,
    DictKeyMustBeBasicType,
    DictEntryHasNoFields,
    DictEntryHasOnlyOneField,
    DictEntryHasTooManyFields,
    DictEntryNotInsideArray,
    ExceededMaximumArrayRecursion,
    ExceededMaximumStructRecursion,
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use SignatureErrorKind::*;

        let message = match self.kind {
            UnknownTypeCode(code) => return write!(f, "unknown type code {code:?}"),
            Empty => "signature is empty",
            SignatureTooLong => "signature is longer than 255 bytes",
            NotSingleCompleteType => "more than one complete type",
            MissingArrayElementType => "array is missing its element type",
            StructEndedButNotStarted => "`)` without a matching `(`",
            DictEndedButNotStarted => "`}` without a matching `{`",
            StructStartedButNotEnded => "`(` is never closed",
            DictStartedButNotEnded => "`{` is never closed",
            StructHasNoFields => "struct has no fields",
            DictKeyMustBeBasicType => "dict entry key is not a basic type",
            DictEntryHasNoFields => "dict entry has no fields",
            DictEntryHasOnlyOneField => "dict entry has a key but no value",
            DictEntryHasTooManyFields => "dict entry has more than two fields",
            DictEntryNotInsideArray => "dict entry outside of an array",
            ExceededMaximumArrayRecursion => "arrays nested too deeply",
            ExceededMaximumStructRecursion => "structs nested too deeply",
        };

        f.write_str(message)
    }
}

impl error::Error for SignatureError {}
