// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

pub(crate) use nom::bytes::streaming::take;
pub(crate) use nom::character::streaming::{crlf, digit1};
pub(crate) use nom::{Err, IResult, Needed};

use nom::error::{Error as NomError, ErrorKind};

pub(crate) fn failure(input: &[u8]) -> Err<NomError<&[u8]>> {
    Err::Failure(NomError::new(input, ErrorKind::Tag))
}

/// Parses a possibly-negative decimal integer.
pub(crate) fn parse_i64(input: &[u8]) -> IResult<&[u8], i64> {
    let (input, negative) = if input.first() == Some(&b'-') {
        let (input, _) = take(1usize)(input)?;
        (input, true)
    } else {
        (input, false)
    };
    let (input, digits) = digit1(input)?;

    // digit1 only matches ascii digits
    let digits = unsafe { core::str::from_utf8_unchecked(digits) };
    let magnitude = digits.parse::<i64>().map_err(|_| failure(input))?;

    let value = if negative { -magnitude } else { magnitude };

    Ok((input, value))
}
