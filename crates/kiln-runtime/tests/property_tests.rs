//! Property-based tests for the Kiln runtime.
//!
//! Uses proptest to generate random inputs and verify invariants hold.

use kiln_runtime::heap::{align_to_word, Heap, HEADER_SIZE};
use kiln_runtime::types::{is_instance, ClassSpec, TypeDescriptor, TypeRegistry, OBJECT_CLASS};
use kiln_runtime::{Codec, CodecError, NativeEncoding};
use proptest::prelude::*;

/// Strategy for generating per-thread allocation requests
fn allocation_plan() -> impl Strategy<Value = Vec<Vec<isize>>> {
    prop::collection::vec(prop::collection::vec(0isize..256, 1..40), 1..5)
}

/// Strategy for generating a class forest below `Object`
///
/// Entry `i` is the parent of class `i`: 0 is `Object`, `p > 0` is class `p - 1`.
fn hierarchy() -> impl Strategy<Value = Vec<usize>> {
    (1usize..12).prop_flat_map(|n| {
        (0..n)
            .map(|i| 0..=i)
            .collect::<Vec<_>>()
    })
}

fn build_hierarchy(parents: &[usize]) -> (TypeRegistry, Vec<&'static TypeDescriptor>) {
    let mut builder = TypeRegistry::builder().unwrap();
    for (i, &parent) in parents.iter().enumerate() {
        let super_name = if parent == 0 {
            OBJECT_CLASS.to_string()
        } else {
            format!("C{}", parent - 1)
        };
        builder
            .define_class(ClassSpec::new(format!("C{}", i), HEADER_SIZE).extends(super_name))
            .unwrap();
        builder.define_array(&format!("C{}", i)).unwrap();
    }
    let registry = builder.build().unwrap();
    let classes = (0..parents.len())
        .map(|i| registry.get(&format!("C{}", i)).unwrap())
        .collect();
    (registry, classes)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Concurrent allocations never overlap and stay inside the arena
    #[test]
    fn heap_allocations_are_disjoint(plan in allocation_plan()) {
        let object = TypeRegistry::standard().unwrap().builtins().object;
        let heap = Heap::new(64 * 1024).unwrap();

        let mut ranges: Vec<(usize, usize)> = std::thread::scope(|s| {
            let workers: Vec<_> = plan
                .iter()
                .map(|sizes| {
                    let heap = &heap;
                    s.spawn(move || {
                        sizes
                            .iter()
                            .map(|&size| {
                                let obj = heap.allocate(object, size).unwrap();
                                let len = align_to_word((size as usize).max(HEADER_SIZE));
                                (obj.addr(), len)
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            workers.into_iter().flat_map(|w| w.join().unwrap()).collect()
        });

        ranges.sort_unstable();
        for pair in ranges.windows(2) {
            prop_assert!(pair[0].0 + pair[0].1 <= pair[1].0);
        }
        let used: usize = ranges.iter().map(|(_, len)| len).sum();
        prop_assert_eq!(heap.cursor(), used);
        prop_assert!(!heap.stats().exhausted);
    }

    /// Once one allocation fails, every later one fails
    #[test]
    fn heap_exhaustion_is_sticky(sizes in prop::collection::vec(1isize..512, 1..64)) {
        let object = TypeRegistry::standard().unwrap().builtins().object;
        let heap = Heap::new(1024).unwrap();
        let mut failed = false;
        for size in sizes {
            let result = heap.allocate(object, size);
            if failed {
                prop_assert!(result.is_err());
            }
            failed |= result.is_err();
        }
        prop_assert_eq!(heap.stats().exhausted, failed);
    }

    /// instanceof matches the ancestor chain, is reflexive and transitive
    #[test]
    fn instanceof_follows_ancestors(parents in hierarchy()) {
        let (registry, classes) = build_hierarchy(&parents);
        let object = registry.builtins().object;

        for &a in &classes {
            prop_assert!(is_instance(Some(a), a));
            prop_assert!(is_instance(Some(a), object));
            prop_assert!(!is_instance(Some(object), a));
            for &b in &classes {
                let expected = a.ancestors().any(|t| std::ptr::eq(t, b));
                prop_assert_eq!(is_instance(Some(a), b), expected);
                if is_instance(Some(a), b) {
                    for &c in &classes {
                        if is_instance(Some(b), c) {
                            prop_assert!(is_instance(Some(a), c));
                        }
                    }
                }
            }
        }
    }

    /// Arrays are covariant in their element type and are objects
    #[test]
    fn instanceof_array_covariance(parents in hierarchy()) {
        let (registry, classes) = build_hierarchy(&parents);
        let builtins = registry.builtins();

        for &a in &classes {
            let a_array = registry.array_of(a).unwrap();
            prop_assert!(is_instance(Some(a_array), builtins.object));
            prop_assert!(is_instance(Some(a_array), builtins.object_array));
            prop_assert!(!is_instance(Some(a_array), builtins.int_array));
            prop_assert!(!is_instance(Some(a_array), a));
            for &b in &classes {
                let b_array = registry.array_of(b).unwrap();
                prop_assert_eq!(
                    is_instance(Some(a_array), b_array),
                    is_instance(Some(a), b)
                );
            }
        }
    }

    /// Valid UTF-8 survives a trip through code units
    #[test]
    fn utf8_roundtrip(text in any::<String>()) {
        let codec = Codec::new(NativeEncoding::Utf8);
        let units = codec.encode_to_vec(text.as_bytes());
        prop_assert_eq!(&units, &text.encode_utf16().collect::<Vec<_>>());
        prop_assert_eq!(codec.decode_to_vec(&units), text.into_bytes());
    }

    /// Latin-1 text survives a trip through code units
    #[test]
    fn latin1_roundtrip(bytes in prop::collection::vec(any::<u8>(), 0..128)) {
        let codec = Codec::new(NativeEncoding::Latin1);
        let units = codec.encode_to_vec(&bytes);
        prop_assert_eq!(units.len(), bytes.len());
        prop_assert_eq!(codec.decode_to_vec(&units), bytes);
    }

    /// Arbitrary code units, lone surrogates included, decode to valid UTF-8
    #[test]
    fn utf8_decode_is_always_valid(units in prop::collection::vec(any::<u16>(), 0..64)) {
        let codec = Codec::new(NativeEncoding::Utf8);
        prop_assert!(String::from_utf8(codec.decode_to_vec(&units)).is_ok());
    }

    /// Bounded encoding reports how much it wrote before running out
    #[test]
    fn bounded_encode_is_a_prefix(text in "[a-zà-ÿ]{0,32}", cap in 0usize..16) {
        let codec = Codec::new(NativeEncoding::Utf8);
        let full = codec.encode_to_vec(text.as_bytes());
        let mut out = vec![0u16; cap];
        match codec.encode(text.as_bytes(), &mut out) {
            Ok(n) => {
                prop_assert!(full.len() <= cap);
                prop_assert_eq!(&out[..n], &full[..]);
            }
            Err(CodecError::OutputExhausted { written }) => {
                prop_assert!(full.len() > cap);
                prop_assert!(written <= cap);
                prop_assert_eq!(&out[..written], &full[..written]);
            }
        }
    }
}
