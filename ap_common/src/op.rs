//! Small helper macro for deriving arithmetic operators on transparent
//! single-field newtypes.

#[macro_export]
macro_rules! op {
    (binary $t:ty, $trait:ident, $f:ident) => {
        impl std::ops::$trait for $t {
            type Output = Self;

            fn $f(self, rhs: Self) -> Self::Output {
                Self(std::ops::$trait::$f(self.0, rhs.0))
            }
        }
    };
    (inplace $t:ty, $trait:ident, $f:ident) => {
        impl std::ops::$trait for $t {
            fn $f(&mut self, rhs: Self) {
                std::ops::$trait::$f(&mut self.0, rhs.0);
            }
        }
    };
    (unary $t:ty, $trait:ident, $f:ident) => {
        impl std::ops::$trait for $t {
            type Output = Self;

            fn $f(self) -> Self::Output {
                Self(std::ops::$trait::$f(self.0))
            }
        }
    };
}
