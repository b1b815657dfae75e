// Copyright 2022 Bryant Luk
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Decides which tokens reach the output at all.

use crate::{
    error::{MalformedInputError, MalformedKind},
    policy::Policy,
    token::Token,
};

use super::LOG_TARGET;

/// Tracks how deep the stream is inside disallowed elements.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(super) struct Acceptance {
    ignore_depth: usize,
}

impl Acceptance {
    #[inline]
    #[must_use]
    pub(super) const fn ignore_depth(&self) -> usize {
        self.ignore_depth
    }

    /// Returns true if the token should be passed on.
    ///
    /// The fake root is never passed to the policy and never changes the
    /// depth.
    pub(super) fn accept<P>(
        &mut self,
        token: &Token<'_>,
        policy: &P,
    ) -> Result<bool, MalformedInputError>
    where
        P: Policy + ?Sized,
    {
        match token {
            Token::StartTag(tag) => {
                let name = tag.local();
                if policy.fake_root_name() == Some(name) {
                    return Ok(false);
                }
                if !policy.is_allowed_tag(name) {
                    if self.ignore_depth == 0 {
                        log::debug!(target: LOG_TARGET, "dropping <{name}> and its content");
                    }
                    self.ignore_depth += 1;
                    return Ok(false);
                }
                Ok(self.ignore_depth == 0)
            }
            Token::EndTag(tag) => {
                let name = tag.local();
                if policy.fake_root_name() == Some(name) {
                    return Ok(false);
                }
                if !policy.is_allowed_tag(name) {
                    let Some(depth) = self.ignore_depth.checked_sub(1) else {
                        return Err(MalformedInputError::new(
                            0,
                            MalformedKind::UnexpectedEndTag(name.to_string()),
                        ));
                    };
                    self.ignore_depth = depth;
                    return Ok(false);
                }
                Ok(self.ignore_depth == 0)
            }
            Token::Characters(_) | Token::EndOfStream => Ok(self.ignore_depth == 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::StartTag;

    struct Fixture;

    impl Policy for Fixture {
        fn is_allowed_tag(&self, tag: &str) -> bool {
            assert_ne!(tag, "root", "fake root passed to the policy");
            matches!(tag, "p" | "b")
        }

        fn is_allowed_attribute(&self, _tag: &str, _attribute: &str, _value: &str) -> bool {
            false
        }

        fn is_self_closing_element(&self, _tag: &str) -> bool {
            false
        }

        fn is_ignore_blank_tag(&self, _tag: &str) -> bool {
            false
        }

        fn fake_root_name(&self) -> Option<&str> {
            Some("root")
        }
    }

    fn accepted(tokens: &[Token<'_>]) -> Vec<bool> {
        let mut acceptance = Acceptance::default();
        tokens
            .iter()
            .map(|token| acceptance.accept(token, &Fixture).unwrap())
            .collect()
    }

    #[test]
    fn allowed_tokens_pass() {
        let tokens = [
            StartTag::new("p").into(),
            Token::characters("x"),
            Token::end_tag("p"),
            Token::EndOfStream,
        ];
        assert_eq!(accepted(&tokens), [true, true, true, true]);
    }

    #[test]
    fn disallowed_subtree_is_rejected() {
        let tokens = [
            StartTag::new("p").into(),
            StartTag::new("script").into(),
            StartTag::new("b").into(),
            Token::characters("x"),
            Token::end_tag("b"),
            Token::end_tag("script"),
            Token::characters("y"),
            Token::end_tag("p"),
        ];
        assert_eq!(
            accepted(&tokens),
            [true, false, false, false, false, false, true, true]
        );
    }

    #[test]
    fn nested_disallowed_elements() {
        let mut acceptance = Acceptance::default();
        for name in ["u", "script", "u"] {
            assert!(!acceptance
                .accept(&StartTag::new(name).into(), &Fixture)
                .unwrap());
        }
        assert_eq!(acceptance.ignore_depth(), 3);
        for name in ["u", "script"] {
            assert!(!acceptance.accept(&Token::end_tag(name), &Fixture).unwrap());
        }
        assert_eq!(acceptance.ignore_depth(), 1);
        assert!(!acceptance.accept(&Token::EndOfStream, &Fixture).unwrap());
        assert!(!acceptance.accept(&Token::end_tag("u"), &Fixture).unwrap());
        assert_eq!(acceptance.ignore_depth(), 0);
        assert!(acceptance.accept(&Token::EndOfStream, &Fixture).unwrap());
    }

    #[test]
    fn fake_root_is_transparent() {
        let tokens = [
            StartTag::new("root").into(),
            StartTag::new("b").into(),
            Token::end_tag("b"),
            Token::end_tag("root"),
        ];
        assert_eq!(accepted(&tokens), [false, true, true, false]);

        let mut acceptance = Acceptance::default();
        acceptance
            .accept(&StartTag::new("u").into(), &Fixture)
            .unwrap();
        acceptance
            .accept(&StartTag::new("root").into(), &Fixture)
            .unwrap();
        assert_eq!(acceptance.ignore_depth(), 1);
    }

    #[test]
    fn unmatched_disallowed_end_tag() {
        let mut acceptance = Acceptance::default();
        let err = acceptance
            .accept(&Token::end_tag("script"), &Fixture)
            .unwrap_err();
        assert_eq!(
            err.kind(),
            &MalformedKind::UnexpectedEndTag("script".to_string())
        );
        assert_eq!(acceptance.ignore_depth(), 0);
    }
}
