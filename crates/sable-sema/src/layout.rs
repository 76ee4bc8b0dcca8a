//! Struct layout.
//!
//! Fields are walked in declaration order with a running byte size and a
//! running alignment (the max of the field alignments). A synthetic
//! `i8[n]` padding field is inserted before any field whose alignment
//! requires it, and a final tail-padding field keeps
//! `size % align == 0`. The computed size and alignment are cached on
//! the struct type; `sizeof`/`offsetof` read the cache.

use sable_common::Atom;
use sable_syntax::{QualType, StructField, TypeInterner, TypeKind};

/// Lay out `fields` (name, type) in order. Returns the materialised
/// field list - including padding fields - plus the struct's total size
/// and alignment in bytes.
#[must_use]
pub fn compute_struct_layout(
    types: &mut TypeInterner,
    fields: &[(Atom, QualType)],
) -> (Vec<StructField>, u64, u64) {
    let mut laid_out: Vec<StructField> = Vec::with_capacity(fields.len());
    let mut size_bytes: u64 = 0;
    let mut align_bytes: u64 = 1;

    for &(name, ty) in fields {
        let field_align = types.align_in_bytes(ty.ty).max(1);
        let field_size = types.size_in_bytes(ty.ty);

        if size_bytes % field_align != 0 {
            let padding = field_align - (size_bytes % field_align);
            laid_out.push(padding_field(types, size_bytes, padding));
            size_bytes += padding;
        }

        laid_out.push(StructField {
            name,
            ty,
            offset_bytes: size_bytes,
            is_padding: false,
        });
        size_bytes += field_size;
        align_bytes = align_bytes.max(field_align);
    }

    if size_bytes % align_bytes != 0 {
        let padding = align_bytes - (size_bytes % align_bytes);
        laid_out.push(padding_field(types, size_bytes, padding));
        size_bytes += padding;
    }

    (laid_out, size_bytes, align_bytes)
}

fn padding_field(types: &mut TypeInterner, offset_bytes: u64, padding: u64) -> StructField {
    let i8 = types.prims().i8;
    let ty = types.intern(TypeKind::Array {
        elem: QualType::of(i8),
        lengths: vec![padding],
    });
    StructField {
        name: Atom::EMPTY,
        ty: QualType::of(ty),
        offset_bytes,
        is_padding: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_common::Target;

    fn types() -> TypeInterner {
        TypeInterner::new(Target::default())
    }

    fn int(types: &mut TypeInterner, width: u32) -> QualType {
        QualType::of(types.intern(TypeKind::Int {
            signed: true,
            width,
            platform: false,
        }))
    }

    #[test]
    fn padding_is_inserted_before_misaligned_fields() {
        let mut types = types();
        let i8 = int(&mut types, 8);
        let i64_ = int(&mut types, 64);

        let (fields, size, align) =
            compute_struct_layout(&mut types, &[(Atom(1), i8), (Atom(2), i64_)]);

        assert_eq!(size, 16);
        assert_eq!(align, 8);
        assert_eq!(fields.len(), 3);
        assert!(!fields[0].is_padding);
        assert_eq!(fields[0].offset_bytes, 0);
        assert!(fields[1].is_padding);
        assert_eq!(fields[1].offset_bytes, 1);
        assert!(!fields[2].is_padding);
        assert_eq!(fields[2].offset_bytes, 8);
    }

    #[test]
    fn tail_padding_rounds_the_size_to_the_alignment() {
        let mut types = types();
        let i64_ = int(&mut types, 64);
        let i8 = int(&mut types, 8);

        let (fields, size, align) =
            compute_struct_layout(&mut types, &[(Atom(1), i64_), (Atom(2), i8)]);

        assert_eq!(align, 8);
        assert_eq!(size % align, 0);
        assert_eq!(size, 16);
        assert!(fields.last().unwrap().is_padding);
    }

    #[test]
    fn field_offsets_respect_field_alignment() {
        let mut types = types();
        let i16_ = int(&mut types, 16);
        let i32_ = int(&mut types, 32);
        let i8 = int(&mut types, 8);

        let (fields, size, align) = compute_struct_layout(
            &mut types,
            &[(Atom(1), i8), (Atom(2), i16_), (Atom(3), i32_)],
        );

        for field in fields.iter().filter(|f| !f.is_padding) {
            let falign = types.align_in_bytes(field.ty.ty);
            assert_eq!(field.offset_bytes % falign, 0);
        }
        assert_eq!(size, 8);
        assert_eq!(align, 4);
    }

    #[test]
    fn packed_fields_need_no_padding() {
        let mut types = types();
        let i32_ = int(&mut types, 32);

        let (fields, size, align) =
            compute_struct_layout(&mut types, &[(Atom(1), i32_), (Atom(2), i32_)]);

        assert_eq!(fields.len(), 2);
        assert!(fields.iter().all(|f| !f.is_padding));
        assert_eq!(size, 8);
        assert_eq!(align, 4);
    }

    #[test]
    fn empty_structs_have_zero_size() {
        let mut types = types();
        let (fields, size, align) = compute_struct_layout(&mut types, &[]);
        assert!(fields.is_empty());
        assert_eq!(size, 0);
        assert_eq!(align, 1);
    }
}
