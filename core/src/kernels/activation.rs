//! Activation kernels on Q7 data.
//!
//! ReLU, sigmoid and tanh run in place. Sigmoid and tanh look up 256-entry
//! tables indexed by a Q3.4 value reinterpreted as `u8`; inputs with more than
//! three integer bits exceed the table range and go straight to the asymptote.

use crate::error::{expect_len, NanoResult};
use crate::math::{saturate8, saturate_unsigned};

/// `round(sigmoid(x) * 128)` for `x = (i as i8) / 16`, saturated to Q0.7.
pub(crate) static SIGMOID_TABLE: [i8; 256] = [
      64,   66,   68,   70,   72,   74,   76,   78,   80,   82,   83,   85,   87,   89,   90,   92,
      94,   95,   97,   98,   99,  101,  102,  103,  105,  106,  107,  108,  109,  110,  111,  112,
     113,  114,  114,  115,  116,  116,  117,  118,  118,  119,  119,  120,  120,  121,  121,  122,
     122,  122,  123,  123,  123,  124,  124,  124,  124,  124,  125,  125,  125,  125,  125,  126,
     126,  126,  126,  126,  126,  126,  126,  127,  127,  127,  127,  127,  127,  127,  127,  127,
     127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,
     127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,
     127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,
       0,    0,    0,    0,    0,    0,    0,    0,    0,    0,    0,    0,    0,    0,    0,    0,
       0,    0,    0,    0,    0,    0,    0,    0,    0,    0,    0,    0,    0,    0,    0,    0,
       0,    0,    0,    0,    0,    0,    0,    0,    1,    1,    1,    1,    1,    1,    1,    1,
       1,    1,    1,    1,    1,    1,    1,    1,    1,    1,    2,    2,    2,    2,    2,    2,
       2,    2,    3,    3,    3,    3,    3,    4,    4,    4,    4,    4,    5,    5,    5,    6,
       6,    6,    7,    7,    8,    8,    9,    9,   10,   10,   11,   12,   12,   13,   14,   14,
      15,   16,   17,   18,   19,   20,   21,   22,   23,   25,   26,   27,   29,   30,   31,   33,
      34,   36,   38,   39,   41,   43,   45,   46,   48,   50,   52,   54,   56,   58,   60,   62,
];

/// `round(tanh(x) * 128)` for `x = (i as i8) / 16`, saturated to Q0.7.
pub(crate) static TANH_TABLE: [i8; 256] = [
       0,    8,   16,   24,   31,   39,   46,   53,   59,   65,   71,   76,   81,   86,   90,   94,
      97,  101,  104,  106,  109,  111,  113,  114,  116,  117,  118,  120,  120,  121,  122,  123,
     123,  124,  124,  125,  125,  126,  126,  126,  126,  126,  127,  127,  127,  127,  127,  127,
     127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,
     127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,
     127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,
     127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,
     127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,  127,
    -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128,
    -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128,
    -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128,
    -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128,
    -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -128, -127,
    -127, -127, -127, -127, -127, -127, -127, -126, -126, -126, -126, -126, -125, -125, -124, -124,
    -123, -123, -122, -121, -120, -120, -118, -117, -116, -114, -113, -111, -109, -106, -104, -101,
     -97,  -94,  -90,  -86,  -81,  -76,  -71,  -65,  -59,  -53,  -46,  -39,  -31,  -24,  -16,   -8,
];

/// Integer bits the tables cover.
const TABLE_INT_BITS: i8 = 3;

/// Zero every negative value.
pub fn relu_q7(data: &mut [i8]) {
    for v in data.iter_mut() {
        if *v < 0 {
            *v = 0;
        }
    }
}

fn table_lookup(data: &mut [i8], int_bits: i8, table: &[i8; 256]) {
    let shift = (TABLE_INT_BITS as i32 - int_bits as i32).clamp(0, 7) as u32;
    for v in data.iter_mut() {
        *v = table[((*v >> shift) as u8) as usize];
    }
}

/// Table sigmoid. `int_bits` is the integer width of the input format.
pub fn sigmoid_q7(data: &mut [i8], int_bits: i8) {
    if int_bits > TABLE_INT_BITS {
        for v in data.iter_mut() {
            *v = if *v > 0 { i8::MAX } else { 0 };
        }
        return;
    }
    table_lookup(data, int_bits, &SIGMOID_TABLE);
}

/// Table tanh. `int_bits` is the integer width of the input format.
pub fn tanh_q7(data: &mut [i8], int_bits: i8) {
    if int_bits > TABLE_INT_BITS {
        for v in data.iter_mut() {
            *v = match *v {
                x if x > 0 => i8::MAX,
                0 => 0,
                _ => i8::MIN,
            };
        }
        return;
    }
    table_lookup(data, int_bits, &TANH_TABLE);
}

/// Values more than this far below the maximum contribute nothing.
pub const SOFTMAX_FLOOR: i32 = 8;

/// Base-2 shift-only softmax.
///
/// With `floor = max - 8`, every value above the floor contributes
/// `2^clamp(v - floor, 0..31)` to `sum`; outputs are
/// `saturate8((2^20 / sum) >> clamp(13 + floor - v, 0..31))`, and values at or
/// below the floor become 0.
pub fn softmax_q7(input: &[i8], output: &mut [i8]) -> NanoResult<()> {
    expect_len(output.len(), input.len())?;
    let Some(max) = input.iter().copied().max() else {
        return Ok(());
    };
    let floor = max as i32 - SOFTMAX_FLOOR;

    let mut sum: i32 = 0;
    for &v in input {
        if v as i32 > floor {
            sum += 1 << saturate_unsigned(v as i32 - floor, 5);
        }
    }
    // the maximum alone contributes 2^8, so sum is never zero here
    let base = 0x10_0000 / sum.max(1);

    for (o, &v) in output.iter_mut().zip(input) {
        *o = if v as i32 > floor {
            saturate8(base >> saturate_unsigned(13 + floor - v as i32, 5))
        } else {
            0
        };
    }
    Ok(())
}
