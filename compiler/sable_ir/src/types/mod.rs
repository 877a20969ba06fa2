//! Unified type pool.
//!
//! Every type the compiler can talk about lives in one append-only pool and
//! is referenced by its 32-bit [`TypeId`]. [`TypeKind`] is a closed sum over
//! every kind the type system can produce, so consumers (notably the
//! metaprogram-result decoder) match exhaustively and adding a kind is a
//! compile error until every match site is updated.
//!
//! Byte layout (size, alignment, member offsets) is computed once at type
//! construction time and cached on the pool entry.


use crate::interner::StrId;
use crate::ast::NodeId;

/// A 32-bit index into the type pool.
///
/// Primitive types have fixed indices and are pre-interned at pool creation.
/// Type equality is index equality.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(transparent)]
pub struct TypeId(u32);

impl TypeId {
    // === Primitive types, pre-interned at pool creation ===

    /// The empty/void type. Decodes to no node.
    pub const VOID: Self = Self(0);
    /// 1-byte boolean.
    pub const BOOL: Self = Self(1);
    /// Signed integers.
    pub const I8: Self = Self(2);
    pub const I16: Self = Self(3);
    pub const I32: Self = Self(4);
    pub const I64: Self = Self(5);
    /// Unsigned integers.
    pub const U8: Self = Self(6);
    pub const U16: Self = Self(7);
    pub const U32: Self = Self(8);
    pub const U64: Self = Self(9);
    /// Floating point.
    pub const F32: Self = Self(10);
    pub const F64: Self = Self(11);
    /// String: `(pointer, length)` pair in VM memory.
    pub const STR: Self = Self(12);
    /// A first-class type value (stores a `TypeId` at runtime).
    pub const TYPE: Self = Self(13);

    /// First index handed out for dynamically constructed types.
    pub const FIRST_DYNAMIC: u32 = 14;

    /// Create an index from a raw u32 value.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw index value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Whether this is one of the pre-interned primitives.
    #[inline]
    pub const fn is_primitive(self) -> bool {
        self.0 < Self::FIRST_DYNAMIC
    }
}

/// Declared width of an integer type, in bits.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

impl IntWidth {
    /// Width in bytes.
    #[inline]
    pub const fn bytes(self) -> u32 {
        match self {
            IntWidth::W8 => 1,
            IntWidth::W16 => 2,
            IntWidth::W32 => 4,
            IntWidth::W64 => 8,
        }
    }
}

/// Width of a floating-point type.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum FloatWidth {
    W32,
    W64,
}

impl FloatWidth {
    /// Width in bytes.
    #[inline]
    pub const fn bytes(self) -> u32 {
        match self {
            FloatWidth::W32 => 4,
            FloatWidth::W64 => 8,
        }
    }
}

/// A named member of a composite type, at a computed byte offset.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Member {
    pub name: StrId,
    pub ty: TypeId,
    pub offset: u32,
}

/// Closed sum over every kind of type the system can produce.
///
/// The decoder is total over this enum; kinds it cannot reconstruct a
/// literal for (`Pointer`, `Reference`, `Variadic`, `Polymorphic`,
/// `OpenExistential`, `FunctionAddress`) are still listed so the match
/// stays exhaustive.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum TypeKind {
    Void,
    Bool,
    Int {
        signed: bool,
        width: IntWidth,
    },
    /// Enum backed by an integer type; `None` means unspecified, which
    /// reads as 4 bytes.
    Enum {
        name: StrId,
        backing: Option<TypeId>,
    },
    Float {
        width: FloatWidth,
    },
    Str,
    /// A first-class type value.
    TypeValue,
    Function {
        params: Vec<TypeId>,
        ret: TypeId,
    },
    /// Distinct nominal wrapper around an underlying representation type.
    Opaque {
        name: StrId,
        underlying: TypeId,
    },
    Struct {
        name: StrId,
        members: Vec<Member>,
    },
    /// All members live at offset 0. Discriminated unions carry a `u32`
    /// 1-based active-member index at `discriminant_offset`; bit-exact
    /// ("unsafe") unions have no discriminant and decode their largest
    /// member directly.
    Union {
        name: StrId,
        members: Vec<Member>,
        discriminated: bool,
        discriminant_offset: u32,
    },
    Tuple {
        members: Vec<Member>,
    },
    FixedArray {
        element: TypeId,
        len: u32,
    },
    Slice {
        element: TypeId,
    },
    Pointer {
        pointee: TypeId,
    },
    Reference {
        referent: TypeId,
    },
    Variadic {
        element: Option<TypeId>,
    },
    /// Unresolved generic parameter.
    Polymorphic {
        name: StrId,
    },
    /// Open existential (`any`-style erased value).
    OpenExistential,
    /// Address of a function without a declaration attached.
    FunctionAddress,
}

struct TypeData {
    kind: TypeKind,
    size: u32,
    align: u32,
    /// Declaration node for function types, when one exists.
    declaration: Option<NodeId>,
}

/// Append-only type storage.
///
/// Not internally synchronized; the compiler context wraps it in a lock.
pub struct TypePool {
    entries: Vec<TypeData>,
}

const PTR_SIZE: u32 = 8;

fn align_up(value: u32, align: u32) -> u32 {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

impl TypePool {
    /// Create a pool with the primitive types pre-interned at their fixed
    /// indices.
    pub fn new() -> Self {
        let mut pool = TypePool {
            entries: Vec::with_capacity(32),
        };
        pool.push_raw(TypeKind::Void, 0, 1);
        pool.push_raw(TypeKind::Bool, 1, 1);
        for (signed, width) in [
            (true, IntWidth::W8),
            (true, IntWidth::W16),
            (true, IntWidth::W32),
            (true, IntWidth::W64),
            (false, IntWidth::W8),
            (false, IntWidth::W16),
            (false, IntWidth::W32),
            (false, IntWidth::W64),
        ] {
            pool.push_raw(TypeKind::Int { signed, width }, width.bytes(), width.bytes());
        }
        pool.push_raw(TypeKind::Float { width: FloatWidth::W32 }, 4, 4);
        pool.push_raw(TypeKind::Float { width: FloatWidth::W64 }, 8, 8);
        // String: (pointer, length) pair.
        pool.push_raw(TypeKind::Str, 2 * PTR_SIZE, PTR_SIZE);
        pool.push_raw(TypeKind::TypeValue, PTR_SIZE, PTR_SIZE);
        debug_assert_eq!(pool.entries.len() as u32, TypeId::FIRST_DYNAMIC);
        pool
    }

    fn push_raw(&mut self, kind: TypeKind, size: u32, align: u32) -> TypeId {
        let raw = u32::try_from(self.entries.len())
            .unwrap_or_else(|_| unreachable!("type pool exceeded u32::MAX entries"));
        self.entries.push(TypeData {
            kind,
            size,
            align,
            declaration: None,
        });
        TypeId(raw)
    }

    fn entry(&self, id: TypeId) -> &TypeData {
        &self.entries[id.0 as usize]
    }

    /// Kind of a type.
    #[inline]
    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.entry(id).kind
    }

    /// Size of a value of this type, in bytes.
    #[inline]
    pub fn size_of(&self, id: TypeId) -> u32 {
        self.entry(id).size
    }

    /// Alignment of a value of this type, in bytes.
    #[inline]
    pub fn align_of(&self, id: TypeId) -> u32 {
        self.entry(id).align
    }

    /// Number of types in the pool.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// A fresh pool still has its primitives, so this is never true; kept
    /// for API symmetry with the other arenas.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // === Composite constructors ===

    /// Lay out members sequentially, C-style. Returns (members, size, align).
    fn layout_members(&self, fields: &[(StrId, TypeId)]) -> (Vec<Member>, u32, u32) {
        let mut members = Vec::with_capacity(fields.len());
        let mut offset = 0u32;
        let mut align = 1u32;
        for &(name, ty) in fields {
            let member_align = self.align_of(ty).max(1);
            align = align.max(member_align);
            offset = align_up(offset, member_align);
            members.push(Member { name, ty, offset });
            offset += self.size_of(ty);
        }
        (members, align_up(offset, align), align)
    }

    /// Create a struct type with sequentially laid-out members.
    pub fn struct_type(&mut self, name: StrId, fields: &[(StrId, TypeId)]) -> TypeId {
        let (members, size, align) = self.layout_members(fields);
        self.push_raw(TypeKind::Struct { name, members }, size, align)
    }

    /// Create a tuple type; members are laid out like an anonymous struct.
    pub fn tuple(&mut self, elements: &[TypeId]) -> TypeId {
        let fields: Vec<(StrId, TypeId)> =
            elements.iter().map(|&ty| (StrId::EMPTY, ty)).collect();
        let (members, size, align) = self.layout_members(&fields);
        self.push_raw(TypeKind::Tuple { members }, size, align)
    }

    /// Create a union type. All members live at offset 0; a discriminated
    /// union additionally stores a `u32` active-member index after the
    /// largest member.
    pub fn union_type(
        &mut self,
        name: StrId,
        fields: &[(StrId, TypeId)],
        discriminated: bool,
    ) -> TypeId {
        let mut members = Vec::with_capacity(fields.len());
        let mut payload_size = 0u32;
        let mut align = 1u32;
        for &(member_name, ty) in fields {
            align = align.max(self.align_of(ty).max(1));
            payload_size = payload_size.max(self.size_of(ty));
            members.push(Member {
                name: member_name,
                ty,
                offset: 0,
            });
        }
        let (size, discriminant_offset) = if discriminated {
            align = align.max(4);
            let disc = align_up(payload_size, 4);
            (align_up(disc + 4, align), disc)
        } else {
            (align_up(payload_size, align), 0)
        };
        self.push_raw(
            TypeKind::Union {
                name,
                members,
                discriminated,
                discriminant_offset,
            },
            size,
            align,
        )
    }

    /// Create an enum type over an integer backing type.
    pub fn enum_type(&mut self, name: StrId, backing: Option<TypeId>) -> TypeId {
        let (size, align) = match backing {
            Some(ty) => (self.size_of(ty), self.align_of(ty)),
            // Unspecified backing reads as 4 bytes.
            None => (4, 4),
        };
        self.push_raw(TypeKind::Enum { name, backing }, size, align)
    }

    /// Create a fixed-size array type `[len]element`.
    pub fn fixed_array(&mut self, element: TypeId, len: u32) -> TypeId {
        let size = self
            .size_of(element)
            .checked_mul(len)
            .unwrap_or_else(|| unreachable!("fixed array size exceeds u32::MAX bytes"));
        let align = self.align_of(element);
        self.push_raw(TypeKind::FixedArray { element, len }, size, align)
    }

    /// Create a slice type `[]element`: a `(pointer, length)` pair.
    pub fn slice(&mut self, element: TypeId) -> TypeId {
        self.push_raw(TypeKind::Slice { element }, 2 * PTR_SIZE, PTR_SIZE)
    }

    /// Create an opaque wrapper type around `underlying`.
    pub fn opaque(&mut self, name: StrId, underlying: TypeId) -> TypeId {
        let size = self.size_of(underlying);
        let align = self.align_of(underlying);
        self.push_raw(TypeKind::Opaque { name, underlying }, size, align)
    }

    /// Create a function type. Values of it are pointer-sized.
    pub fn function(&mut self, params: &[TypeId], ret: TypeId) -> TypeId {
        self.push_raw(
            TypeKind::Function {
                params: params.to_vec(),
                ret,
            },
            PTR_SIZE,
            PTR_SIZE,
        )
    }

    /// Attach a declaration node to a function type.
    pub fn set_declaration(&mut self, id: TypeId, declaration: NodeId) {
        self.entries[id.0 as usize].declaration = Some(declaration);
    }

    /// Declaration node attached to a function type, if any.
    pub fn declaration_of(&self, id: TypeId) -> Option<NodeId> {
        self.entry(id).declaration
    }

    /// Create a raw pointer type.
    pub fn pointer(&mut self, pointee: TypeId) -> TypeId {
        self.push_raw(TypeKind::Pointer { pointee }, PTR_SIZE, PTR_SIZE)
    }

    /// Create a reference type.
    pub fn reference(&mut self, referent: TypeId) -> TypeId {
        self.push_raw(TypeKind::Reference { referent }, PTR_SIZE, PTR_SIZE)
    }

    /// Create a variadic parameter type.
    pub fn variadic(&mut self, element: Option<TypeId>) -> TypeId {
        self.push_raw(TypeKind::Variadic { element }, 2 * PTR_SIZE, PTR_SIZE)
    }

    /// Create an unresolved generic parameter type.
    pub fn polymorphic(&mut self, name: StrId) -> TypeId {
        self.push_raw(TypeKind::Polymorphic { name }, 0, 1)
    }

    /// Create the open existential type.
    pub fn open_existential(&mut self) -> TypeId {
        self.push_raw(TypeKind::OpenExistential, 2 * PTR_SIZE, PTR_SIZE)
    }

    /// Create a bare function-address type.
    pub fn function_address(&mut self) -> TypeId {
        self.push_raw(TypeKind::FunctionAddress, PTR_SIZE, PTR_SIZE)
    }

    /// Human-readable rendering for diagnostics.
    pub fn render(&self, id: TypeId, interner: &crate::Interner) -> String {
        match self.kind(id) {
            TypeKind::Void => "void".to_owned(),
            TypeKind::Bool => "bool".to_owned(),
            TypeKind::Int { signed: true, width } => format!("i{}", width.bytes() * 8),
            TypeKind::Int { signed: false, width } => format!("u{}", width.bytes() * 8),
            TypeKind::Enum { name, .. } => format!("enum {}", interner.resolve(*name)),
            TypeKind::Float { width } => format!("f{}", width.bytes() * 8),
            TypeKind::Str => "string".to_owned(),
            TypeKind::TypeValue => "type".to_owned(),
            TypeKind::Function { params, ret } => {
                let params: Vec<String> =
                    params.iter().map(|&p| self.render(p, interner)).collect();
                format!("fn({}) -> {}", params.join(", "), self.render(*ret, interner))
            }
            TypeKind::Opaque { name, .. } => interner.resolve(*name).to_owned(),
            TypeKind::Struct { name, .. } => format!("struct {}", interner.resolve(*name)),
            TypeKind::Union { name, .. } => format!("union {}", interner.resolve(*name)),
            TypeKind::Tuple { members } => {
                let parts: Vec<String> = members
                    .iter()
                    .map(|m| self.render(m.ty, interner))
                    .collect();
                format!("({})", parts.join(", "))
            }
            TypeKind::FixedArray { element, len } => {
                format!("[{}]{}", len, self.render(*element, interner))
            }
            TypeKind::Slice { element } => format!("[]{}", self.render(*element, interner)),
            TypeKind::Pointer { pointee } => format!("*{}", self.render(*pointee, interner)),
            TypeKind::Reference { referent } => format!("&{}", self.render(*referent, interner)),
            TypeKind::Variadic { element: Some(e) } => {
                format!("...{}", self.render(*e, interner))
            }
            TypeKind::Variadic { element: None } => "...".to_owned(),
            TypeKind::Polymorphic { name } => format!("${}", interner.resolve(*name)),
            TypeKind::OpenExistential => "any".to_owned(),
            TypeKind::FunctionAddress => "addr(fn)".to_owned(),
        }
    }
}

impl Default for TypePool {
    fn default() -> Self {
        Self::new()
    }
}
