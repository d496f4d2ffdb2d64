macro_rules! assert_lurk_err {
    ($expected:expr, $actual:expr) => {
        assert_eq!(
            $expected,
            $actual
                .downcast::<$crate::common::error::LurkError>()
                .expect("Lurk error type expected")
        )
    };
}

macro_rules! bail_unless_lurk_err {
    ($expected_lurk_err:expr, $result:expr) => {
        match $result {
            Err(err) => $crate::common::assertions::assert_lurk_err!($expected_lurk_err, err),
            Ok(ok) => panic!("Should fail with error {:}, instead returned {:#?}", $expected_lurk_err, ok),
        }
    };
}

pub(crate) use assert_lurk_err;
pub(crate) use bail_unless_lurk_err;
