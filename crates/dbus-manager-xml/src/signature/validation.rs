use super::{SignatureError, SignatureErrorKind, MAX_CONTAINER_DEPTH, MAX_SIGNATURE};

#[derive(Debug, Clone, Copy)]
enum Kind {
    Array,
    Struct,
    Dict,
}

/// Validate the given signature, returning the number of top-level complete
/// types it contains.
pub(super) fn validate(bytes: &[u8]) -> Result<usize, SignatureError> {
    use SignatureErrorKind::*;

    if bytes.len() > MAX_SIGNATURE {
        return Err(SignatureError::new(SignatureTooLong));
    }

    // Each container is paired with the number of complete types it holds.
    let mut stack = Vec::<(Kind, usize)>::new();
    let mut arrays = 0;
    let mut structs = 0;
    let mut complete = 0;

    for &b in bytes {
        let mut is_basic = match b {
            b'y' | b'b' | b'n' | b'q' | b'i' | b'u' | b'x' | b't' | b'd' | b's' | b'o' | b'g'
            | b'h' => true,
            b'v' => false,
            b'a' => {
                if arrays == MAX_CONTAINER_DEPTH {
                    return Err(SignatureError::new(ExceededMaximumArrayRecursion));
                }

                arrays += 1;
                stack.push((Kind::Array, 0));
                continue;
            }
            b'(' => {
                if structs == MAX_CONTAINER_DEPTH {
                    return Err(SignatureError::new(ExceededMaximumStructRecursion));
                }

                structs += 1;
                stack.push((Kind::Struct, 0));
                continue;
            }
            b')' => {
                match stack.pop() {
                    Some((Kind::Struct, 0)) => {
                        return Err(SignatureError::new(StructHasNoFields));
                    }
                    Some((Kind::Struct, _)) => {}
                    Some((Kind::Array, _)) => {
                        return Err(SignatureError::new(MissingArrayElementType));
                    }
                    _ => {
                        return Err(SignatureError::new(StructEndedButNotStarted));
                    }
                }

                structs -= 1;
                false
            }
            b'{' => {
                if !matches!(stack.last(), Some((Kind::Array, _))) {
                    return Err(SignatureError::new(DictEntryNotInsideArray));
                }

                stack.push((Kind::Dict, 0));
                continue;
            }
            b'}' => {
                match stack.pop() {
                    Some((Kind::Dict, 0)) => {
                        return Err(SignatureError::new(DictEntryHasNoFields));
                    }
                    Some((Kind::Dict, 1)) => {
                        return Err(SignatureError::new(DictEntryHasOnlyOneField));
                    }
                    Some((Kind::Dict, 2)) => {}
                    Some((Kind::Dict, _)) => {
                        return Err(SignatureError::new(DictEntryHasTooManyFields));
                    }
                    Some((Kind::Array, _)) => {
                        return Err(SignatureError::new(MissingArrayElementType));
                    }
                    _ => {
                        return Err(SignatureError::new(DictEndedButNotStarted));
                    }
                }

                false
            }
            b => return Err(SignatureError::new(UnknownTypeCode(char::from(b)))),
        };

        // A complete type terminates every array waiting for its element.
        while let Some((Kind::Array, _)) = stack.last() {
            stack.pop();
            arrays -= 1;
            is_basic = false;
        }

        match stack.last_mut() {
            Some((Kind::Dict, n)) => {
                if *n == 0 && !is_basic {
                    return Err(SignatureError::new(DictKeyMustBeBasicType));
                }

                *n += 1;
            }
            Some((_, n)) => {
                *n += 1;
            }
            None => {
                complete += 1;
            }
        }
    }

    match stack.last() {
        Some((Kind::Array, _)) => Err(SignatureError::new(MissingArrayElementType)),
        Some((Kind::Struct, _)) => Err(SignatureError::new(StructStartedButNotEnded)),
        Some((Kind::Dict, _)) => Err(SignatureError::new(DictStartedButNotEnded)),
        None => Ok(complete),
    }
}
