/// Declares the editable fields of one entity kind: a field enum carrying column name,
/// value type and required flag, plus a change struct with one pending slot per field.
macro_rules! entity_change {
    (
        $(#[$meta:meta])*
        $change:ident, $field:ident {
            $( $variant:ident => $slot:ident : $column:literal, $ty:ident, $required:literal; )+
        }
    ) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            ::serde::Serialize, ::serde::Deserialize,
        )]
        #[serde(rename_all = "snake_case")]
        pub enum $field {
            $( $variant, )+
        }

        impl $field {
            pub const ALL: &'static [$field] = &[ $( $field::$variant, )+ ];

            pub fn column(&self) -> &'static str {
                match self {
                    $( Self::$variant => $column, )+
                }
            }

            pub fn value_type(&self) -> $crate::changes::ValueType {
                match self {
                    $( Self::$variant => $crate::changes::ValueType::$ty, )+
                }
            }

            pub fn is_required(&self) -> bool {
                match self {
                    $( Self::$variant => $required, )+
                }
            }
        }

        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, ::serde::Serialize, ::serde::Deserialize)]
        pub struct $change {
            $(
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $slot: Option<$crate::changes::PendingValue>,
            )+
        }

        impl $change {
            pub fn slot(&self, field: $field) -> Option<&$crate::changes::PendingValue> {
                match field {
                    $( $field::$variant => self.$slot.as_ref(), )+
                }
            }

            pub fn slot_mut(
                &mut self,
                field: $field,
            ) -> &mut Option<$crate::changes::PendingValue> {
                match field {
                    $( $field::$variant => &mut self.$slot, )+
                }
            }

            /// Pending slots in declaration order
            pub fn fields(&self) -> Vec<($field, &$crate::changes::PendingValue)> {
                $field::ALL
                    .iter()
                    .filter_map(|f| self.slot(*f).map(|v| (*f, v)))
                    .collect()
            }

            pub fn is_empty(&self) -> bool {
                $( self.$slot.is_none() )&&+
            }

            pub fn clear(&mut self) {
                *self = Self::default();
            }
        }
    };
}

pub(crate) use entity_change;
