// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


//! Declarative flag sets.

/// Declares a copyable set of flags backed by an unsigned integer.
///
/// The generated type has an `EMPTY` constant, one constant per flag, the
/// usual set operations and a `Debug` impl listing the flag names.
#[macro_export]
macro_rules! tessera_bitflags {
    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident: $ty:ty {
            $(
                $(#[$flag_attr:meta])*
                const $flag_name:ident = $flag_value:expr;
            )*
        }
    ) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        $vis struct $name {
            bits: $ty,
        }

        impl $name {
            /// No flag set.
            pub const EMPTY: Self = Self { bits: 0 };

            $(
                $(#[$flag_attr])*
                pub const $flag_name: Self = Self { bits: $flag_value };
            )*

            /// Wraps raw bits, unknown bits included.
            pub const fn from_bits_retain(bits: $ty) -> Self {
                Self { bits }
            }

            /// The raw bits.
            pub const fn bits(&self) -> $ty {
                self.bits
            }

            /// Checks if no flag is set.
            pub const fn is_empty(&self) -> bool {
                self.bits == 0
            }

            /// Checks if every flag of `other` is set.
            pub const fn contains(&self, other: Self) -> bool {
                (self.bits & other.bits) == other.bits
            }

            /// Checks if any flag of `other` is set.
            pub const fn intersects(&self, other: Self) -> bool {
                (self.bits & other.bits) != 0
            }

            /// Sets the flags of `other`.
            pub fn insert(&mut self, other: Self) {
                self.bits |= other.bits;
            }

            /// Clears the flags of `other`.
            pub fn remove(&mut self, other: Self) {
                self.bits &= !other.bits;
            }

            /// Sets or clears the flags of `other`.
            pub fn set(&mut self, other: Self, value: bool) {
                if value {
                    self.insert(other);
                } else {
                    self.remove(other);
                }
            }

            /// `self` with the flags of `other` set.
            #[must_use]
            pub const fn with(self, other: Self) -> Self {
                Self { bits: self.bits | other.bits }
            }
        }

        impl core::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, other: Self) -> Self {
                self.with(other)
            }
        }

        impl core::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, other: Self) {
                self.insert(other);
            }
        }

        impl core::ops::BitAnd for $name {
            type Output = Self;
            fn bitand(self, other: Self) -> Self {
                Self { bits: self.bits & other.bits }
            }
        }

        impl core::fmt::Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                let mut remaining = self.bits;
                let mut names = f.debug_set();
                $(
                    let flag: $ty = $flag_value;
                    if flag != 0 && remaining & flag == flag {
                        names.entry(&format_args!("{}", stringify!($flag_name)));
                        remaining &= !flag;
                    }
                )*
                if remaining != 0 {
                    names.entry(&format_args!("{:#x}", remaining));
                }
                names.finish()
            }
        }
    };
}

#[cfg(test)]
mod tests {
    crate::tessera_bitflags! {
        struct Channels: u8 {
            const RED = 1 << 0;
            const GREEN = 1 << 1;
            const BLUE = 1 << 2;
        }
    }

    #[test]
    fn set_operations() {
        let mut channels = Channels::RED | Channels::BLUE;
        assert!(channels.contains(Channels::RED));
        assert!(!channels.contains(Channels::RED | Channels::GREEN));
        assert!(channels.intersects(Channels::RED | Channels::GREEN));

        channels.set(Channels::RED, false);
        channels |= Channels::GREEN;
        assert_eq!(channels, Channels::GREEN.with(Channels::BLUE));
        assert_eq!((channels & Channels::BLUE).bits(), 0b100);
        assert!(Channels::default().is_empty());
    }

    #[test]
    fn debug_lists_flag_names() {
        assert_eq!(format!("{:?}", Channels::EMPTY), "{}");
        assert_eq!(format!("{:?}", Channels::RED | Channels::BLUE), "{RED, BLUE}");
        assert_eq!(
            format!("{:?}", Channels::from_bits_retain(0b1001)),
            "{RED, 0x8}"
        );
    }
}
