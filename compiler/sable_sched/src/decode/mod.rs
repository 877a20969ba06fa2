//! Reconstruction of typed AST literals from raw VM result bytes.
//!
//! When a metaprogram finishes, its result is a block of bytes in the
//! worker's VM memory plus the declared result type. [`decode`] walks the
//! type and rebuilds the literal node tree the validator would have
//! produced for the equivalent source text.
//!
//! The decoder is total over [`TypeKind`]: kinds that cannot appear in a
//! well-formed result (`Pointer`, `Reference`, ...) are a *user* error
//! reported through [`DecodeError`]; an unknown discriminant or a function
//! value without a declaration is a compiler bug and aborts.


use sable_ir::{
    AstArena, CastKind, IntWidth, Interner, NodeId, Span, TypeId, TypeKind, TypePool,
};
use smallvec::SmallVec;
use thiserror::Error;

use crate::vm::{FunctionRegistry, VmAddr, VmMemory};

/// User-reportable decoding failure.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The metaprogram's result type cannot be turned into a literal.
    #[error("unsupported result type '{rendered}' for a metaprogram")]
    UnsupportedType { rendered: String },
    /// Returning an empty dynamic array from a metaprogram is disallowed.
    #[error("metaprogram returned an empty dynamic array")]
    EmptySliceResult,
}

/// Everything the decoder needs, borrowed for one metaprogram's result.
pub struct DecodeContext<'a> {
    pub types: &'a mut TypePool,
    pub arena: &'a mut AstArena,
    pub interner: &'a Interner,
    pub functions: &'a FunctionRegistry,
    pub memory: &'a mut VmMemory,
    /// Span stamped on every synthesized node (the directive's site).
    pub span: Span,
}

/// Read an integer of the given width, sign-extending into the literal's
/// 64-bit payload when the type is signed.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
fn read_int_bits(memory: &VmMemory, addr: VmAddr, width: IntWidth, signed: bool) -> u64 {
    match (width, signed) {
        (IntWidth::W8, false) => u64::from(memory.read_u8(addr)),
        (IntWidth::W16, false) => u64::from(memory.read_u16(addr)),
        (IntWidth::W32, false) => u64::from(memory.read_u32(addr)),
        (IntWidth::W64, false) => memory.read_u64(addr),
        (IntWidth::W8, true) => memory.read_u8(addr) as i8 as i64 as u64,
        (IntWidth::W16, true) => memory.read_u16(addr) as i16 as i64 as u64,
        (IntWidth::W32, true) => memory.read_u32(addr) as i32 as i64 as u64,
        (IntWidth::W64, true) => memory.read_u64(addr),
    }
}

/// Read a `(pointer, length)` string value, releasing the backing buffer
/// if the VM's allocator owns it. Also used by the bridge for
/// source-generating directives.
pub(crate) fn read_string_value(memory: &mut VmMemory, addr: VmAddr) -> String {
    let data = memory.read_u64(addr);
    let len = memory.read_u64(addr + 8);
    let len = usize::try_from(len)
        .unwrap_or_else(|_| unreachable!("string length {len:#x} is negative or absurd"));
    if data == 0 {
        assert_eq!(len, 0, "non-empty string with a null data pointer");
        return String::new();
    }
    let text = String::from_utf8_lossy(memory.read_bytes(data, len)).into_owned();
    if memory.is_heap_allocation(data) {
        memory.free(data);
    }
    text
}

/// Decode the value of type `ty` at `addr` into an AST literal node.
///
/// Returns `Ok(None)` for the empty/void type, which produces no node.
pub fn decode(
    ctx: &mut DecodeContext<'_>,
    ty: TypeId,
    addr: VmAddr,
) -> Result<Option<NodeId>, DecodeError> {
    // Clone the kind up front: the slice arm interns new types below.
    let kind = ctx.types.kind(ty).clone();
    match kind {
        TypeKind::Void => Ok(None),

        TypeKind::Bool => {
            let value = ctx.memory.read_u8(addr) != 0;
            Ok(Some(ctx.arena.bool_literal(value, ctx.span)))
        }

        TypeKind::Int { signed, width } => {
            let bits = read_int_bits(ctx.memory, addr, width, signed);
            Ok(Some(ctx.arena.int_literal(ty, bits, ctx.span)))
        }

        TypeKind::Enum { backing, .. } => {
            // An enum result reads as its backing integer; unspecified
            // backing reads 4 signed bytes.
            let (signed, width) = match backing {
                Some(backing_ty) => match *ctx.types.kind(backing_ty) {
                    TypeKind::Int { signed, width } => (signed, width),
                    ref other => unreachable!("enum backed by non-integer type {other:?}"),
                },
                None => (true, IntWidth::W32),
            };
            let bits = read_int_bits(ctx.memory, addr, width, signed);
            Ok(Some(ctx.arena.int_literal(ty, bits, ctx.span)))
        }

        TypeKind::Float { width } => {
            let value = match width {
                sable_ir::FloatWidth::W32 => f64::from(ctx.memory.read_f32(addr)),
                sable_ir::FloatWidth::W64 => ctx.memory.read_f64(addr),
            };
            Ok(Some(ctx.arena.real_literal(ty, value, ctx.span)))
        }

        TypeKind::Str => {
            let text = read_string_value(ctx.memory, addr);
            let value = ctx.interner.intern(&text);
            Ok(Some(ctx.arena.string_literal(value, ctx.span)))
        }

        TypeKind::TypeValue => {
            let raw = ctx.memory.read_u64(addr);
            let referenced = u32::try_from(raw)
                .unwrap_or_else(|_| unreachable!("type handle {raw:#x} out of range"));
            assert!(
                (referenced as usize) < ctx.types.len(),
                "decoded type handle {referenced} past the type pool"
            );
            let referenced = TypeId::from_raw(referenced);
            Ok(Some(ctx.arena.type_ref(referenced, ctx.span)))
        }

        TypeKind::Function { .. } => {
            let address = ctx.memory.read_u64(addr);
            let Some(info) = ctx.functions.lookup(address) else {
                unreachable!("decoded function value {address:#x} is not a known function");
            };
            assert!(
                info.declaration.is_some(),
                "decoded function value {address:#x} has no declaration"
            );
            Ok(Some(ctx.arena.func_ref(ty, info.id, ctx.span)))
        }

        TypeKind::Opaque { underlying, .. } => {
            let inner = decode(ctx, underlying, addr)?;
            Ok(inner.map(|node| {
                ctx.arena
                    .implicit_cast(ty, CastKind::OpaqueConversion, node, ctx.span)
            }))
        }

        TypeKind::Tuple { members } => {
            let mut items: SmallVec<[NodeId; 4]> = SmallVec::new();
            for member in &members {
                if let Some(node) = decode(ctx, member.ty, addr + u64::from(member.offset))? {
                    items.push(node);
                }
            }
            Ok(Some(ctx.arena.comma_list(ty, items, ctx.span)))
        }

        TypeKind::Struct { members, .. } => {
            let mut args = Vec::with_capacity(members.len());
            for member in &members {
                args.push(decode(ctx, member.ty, addr + u64::from(member.offset))?);
            }
            Ok(Some(ctx.arena.struct_ctor(ty, args, ctx.span)))
        }

        TypeKind::Union {
            members,
            discriminated: false,
            ..
        } => {
            // Bit-exact union: reinterpret as the largest member, at
            // offset 0, and hand back that literal directly.
            let largest = members
                .iter()
                .max_by_key(|m| ctx.types.size_of(m.ty))
                .unwrap_or_else(|| unreachable!("union with no members"));
            decode(ctx, largest.ty, addr)
        }

        TypeKind::Union {
            members,
            discriminated: true,
            discriminant_offset,
            ..
        } => {
            let discriminant = ctx.memory.read_u32(addr + u64::from(discriminant_offset));
            assert!(
                discriminant >= 1 && (discriminant as usize) <= members.len(),
                "union discriminant {discriminant} out of range for {} members",
                members.len()
            );
            let active = (discriminant - 1) as usize;
            let mut args: Vec<Option<NodeId>> = vec![None; members.len()];
            args[active] = decode(
                ctx,
                members[active].ty,
                addr + u64::from(members[active].offset),
            )?;
            Ok(Some(ctx.arena.struct_ctor(ty, args, ctx.span)))
        }

        TypeKind::FixedArray { element, len } => {
            let element_size = u64::from(ctx.types.size_of(element));
            let mut items: SmallVec<[NodeId; 4]> = SmallVec::new();
            for i in 0..u64::from(len) {
                let Some(node) = decode(ctx, element, addr + i * element_size)? else {
                    unreachable!("array element decoded to no node");
                };
                items.push(node);
            }
            Ok(Some(ctx.arena.array_ctor(ty, items, ctx.span)))
        }

        TypeKind::Slice { element } => {
            let data = ctx.memory.read_u64(addr);
            let len = ctx.memory.read_u64(addr + 8);
            if len == 0 {
                return Err(DecodeError::EmptySliceResult);
            }
            let len = u32::try_from(len)
                .unwrap_or_else(|_| unreachable!("slice length {len:#x} is absurd"));
            let array_ty = ctx.types.fixed_array(element, len);
            let array = decode(ctx, array_ty, data)?;
            let Some(array) = array else {
                unreachable!("fixed array decoded to no node");
            };
            if ctx.memory.is_heap_allocation(data) {
                ctx.memory.free(data);
            }
            Ok(Some(ctx.arena.implicit_cast(
                ty,
                CastKind::FixedArrayToSlice,
                array,
                ctx.span,
            )))
        }

        TypeKind::Pointer { .. }
        | TypeKind::Reference { .. }
        | TypeKind::Variadic { .. }
        | TypeKind::Polymorphic { .. }
        | TypeKind::OpenExistential
        | TypeKind::FunctionAddress => Err(DecodeError::UnsupportedType {
            rendered: ctx.types.render(ty, ctx.interner),
        }),
    }
}
