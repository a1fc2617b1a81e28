use std::{collections::HashMap, sync::Arc};

use bincode::{Decode, Encode};
use hashdex_codec::{BincodeCodec, Codec, CodecRegistry, HashAlgorithm, Layout};
use hashdex_common::{
    Result,
    error::{Error, ErrorKind},
};
use hashdex_hash_index::{HashIndex, HashIndexOptions, HashIndexType, INDEX_RETRIEVAL_COST};
use hashdex_index_core::{
    Attribute, AttributeIndex, IndexType, KeyStatisticsIndex, Query, QueryKind, QueryOptions,
    attribute, registry::IndexTypeRegistry,
};
use hashdex_kv::{KeyValueStore, memory_store::MemoryKeyValueStore};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Encode, Decode)]
struct Car {
    id: u32,
    model: String,
    color: Option<String>,
    features: Vec<String>,
}

fn car(id: u32, color: Option<&str>, features: &[&str]) -> Car {
    Car {
        id,
        model: format!("model-{id}"),
        color: color.map(str::to_string),
        features: features.iter().map(|f| f.to_string()).collect(),
    }
}

fn color() -> impl Attribute<Car, Value = String> {
    attribute::single("color", |c: &Car| c.color.clone())
}

fn features() -> impl Attribute<Car, Value = String> {
    attribute::multi("features", |c: &Car| c.features.clone())
}

fn open<A: Attribute<Car>>(store: &Arc<MemoryKeyValueStore>, attribute: A) -> HashIndex<A, Car>
where
    A::Value: PartialOrd + std::fmt::Debug,
{
    let store: Arc<dyn KeyValueStore> = store.clone();
    HashIndexOptions::new(store).open_structural(attribute).unwrap()
}

fn exact<A>(index: &HashIndex<A, Car>, value: &str) -> Vec<Car>
where
    A: Attribute<Car, Value = String>,
{
    let query = Query::equal(index.attribute(), value.to_string());
    let result = index.retrieve(query, QueryOptions::new()).unwrap();
    let mut cars = result.iter().unwrap().map(|c| c.unwrap()).collect::<Vec<_>>();
    cars.sort_by_key(|c| c.id);
    cars
}

fn map_len(store: &MemoryKeyValueStore, name: &str) -> u64 {
    store.open_map(name).unwrap().len().unwrap()
}

#[test]
fn test_basic_scenario() {
    let store = Arc::new(MemoryKeyValueStore::new());
    let index = open(&store, color());
    let (o1, o2, o3) = (
        car(1, Some("a"), &[]),
        car(2, Some("a"), &[]),
        car(3, Some("b"), &[]),
    );
    assert!(index.add_all(&[o1.clone(), o2.clone(), o3.clone()]).unwrap());

    let options = QueryOptions::new();
    assert_eq!(index.count_for_key(&"a".into(), &options).unwrap(), 2);
    assert_eq!(index.count_for_key(&"b".into(), &options).unwrap(), 1);
    assert_eq!(index.count_for_key(&"c".into(), &options).unwrap(), 0);
    assert_eq!(index.count_of_distinct_keys(&options).unwrap(), 2);

    assert_eq!(exact(&index, "a"), vec![o1, o2]);
    assert_eq!(exact(&index, "b"), vec![o3]);
    assert!(exact(&index, "c").is_empty());

    assert_eq!(
        store.map_names().unwrap(),
        vec![
            "index_attrhash_color".to_string(),
            "index_color".to_string(),
            "index_objhash_color".to_string()
        ]
    );
    assert_eq!(map_len(&store, "index_color"), 3);
    assert_eq!(map_len(&store, "index_attrhash_color"), 2);
    assert_eq!(map_len(&store, "index_objhash_color"), 3);
}

#[test]
fn test_null_values_are_not_indexed() {
    let store = Arc::new(MemoryKeyValueStore::new());
    let index = open(&store, color());
    assert!(!index.add_all(&[car(1, None, &[])]).unwrap());
    for name in index.map_names() {
        assert_eq!(map_len(&store, name), 0, "{name}");
    }

    let has = index
        .retrieve(Query::has(index.attribute()), QueryOptions::new())
        .unwrap();
    assert!(has.is_empty().unwrap());
    assert!(!index.remove_all(&[car(1, None, &[])]).unwrap());
}

#[test]
fn test_remove_keeps_content_blobs() {
    let store = Arc::new(MemoryKeyValueStore::new());
    let index = open(&store, color());
    let (o1, o2) = (car(1, Some("a"), &[]), car(2, Some("a"), &[]));
    index.add_all(&[o1.clone(), o2.clone()]).unwrap();

    assert!(index.remove_all(&[o1.clone()]).unwrap());
    assert!(!index.remove_all(&[o1.clone()]).unwrap());
    assert_eq!(exact(&index, "a"), vec![o2.clone()]);

    let options = QueryOptions::new();
    assert_eq!(index.count_for_key(&"a".into(), &options).unwrap(), 1);
    assert_eq!(map_len(&store, "index_attrhash_color"), 1);
    assert_eq!(map_len(&store, "index_objhash_color"), 2);

    index.remove_all(&[o2]).unwrap();
    assert!(exact(&index, "a").is_empty());
    let keys = index
        .distinct_keys(&options)
        .unwrap()
        .map(|k| k.unwrap())
        .collect::<Vec<_>>();
    assert_eq!(keys, vec!["a".to_string()]);
    assert_eq!(index.count_of_distinct_keys(&options).unwrap(), 1);
}

#[test]
fn test_clear_only_drops_associations() {
    let store = Arc::new(MemoryKeyValueStore::new());
    let index = open(&store, color());
    index
        .init(&[car(1, Some("a"), &[]), car(2, Some("b"), &[])])
        .unwrap();
    index.clear().unwrap();

    assert_eq!(map_len(&store, "index_color"), 0);
    assert_eq!(map_len(&store, "index_attrhash_color"), 2);
    assert_eq!(map_len(&store, "index_objhash_color"), 2);
    assert!(exact(&index, "a").is_empty());
    assert_eq!(
        index
            .count_of_distinct_keys(&QueryOptions::new())
            .unwrap(),
        2
    );
}

#[test]
fn test_idempotent_insertion() {
    let store = Arc::new(MemoryKeyValueStore::new());
    let index = open(&store, color());
    let o1 = car(1, Some("a"), &[]);
    assert!(index.add_all(&[o1.clone()]).unwrap());
    assert!(!index.add_all(&[o1.clone()]).unwrap());
    assert!(!index.add_all(&[o1.clone(), o1.clone()]).unwrap());

    let options = QueryOptions::new();
    assert_eq!(index.count_for_key(&"a".into(), &options).unwrap(), 1);
    assert_eq!(exact(&index, "a"), vec![o1]);
    assert_eq!(map_len(&store, "index_objhash_color"), 1);
}

#[test]
fn test_decode_key_round_trip() {
    let store = Arc::new(MemoryKeyValueStore::new());
    let index = open(&store, color());
    let o1 = car(1, Some("crimson"), &[]);
    index.add_all(&[o1.clone()]).unwrap();

    let entry = index.encode_entry(&o1, &"crimson".to_string()).unwrap();
    assert_eq!(entry.key.len(), 2 * index.hash_size());
    assert_eq!(index.decode_key(&entry.key).unwrap(), "crimson");
    assert_eq!(
        index.encode_attribute(&"crimson".to_string()).unwrap(),
        entry.attribute_digest
    );

    let unknown = index.encode_entry(&o1, &"teal".to_string()).unwrap();
    let err = index.decode_key(&unknown.key).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::MissingContent { .. }));
}

#[test]
fn test_multi_valued_attribute() {
    let store = Arc::new(MemoryKeyValueStore::new());
    let index = open(&store, features());
    let cars = vec![
        car(1, None, &["sunroof", "radio"]),
        car(2, None, &["radio"]),
        car(3, None, &[]),
    ];
    index.add_all(&cars).unwrap();

    assert_eq!(exact(&index, "radio"), vec![cars[0].clone(), cars[1].clone()]);
    assert_eq!(exact(&index, "sunroof"), vec![cars[0].clone()]);

    // Existence yields an object once per value, with no de-duplication.
    let has = index
        .retrieve(Query::has(index.attribute()), QueryOptions::new())
        .unwrap();
    let mut ids = has
        .iter()
        .unwrap()
        .map(|c| c.unwrap().id)
        .collect::<Vec<_>>();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 1, 2]);
    assert_eq!(has.size().unwrap(), 3);

    let stats = index
        .statistics_for_distinct_keys(&QueryOptions::new())
        .unwrap()
        .map(|s| s.unwrap())
        .map(|s| (s.key, s.count))
        .collect::<HashMap<_, _>>();
    assert_eq!(stats.len(), 2);
    assert_eq!(stats["radio"], 2);
    assert_eq!(stats["sunroof"], 1);

    let mut pairs = index
        .keys_and_values(&QueryOptions::new())
        .unwrap()
        .map(|kv| {
            let (value, car) = kv.unwrap();
            (value, car.id)
        })
        .collect::<Vec<_>>();
    pairs.sort();
    assert_eq!(
        pairs,
        vec![
            ("radio".to_string(), 1),
            ("radio".to_string(), 2),
            ("sunroof".to_string(), 1)
        ]
    );
}

#[test]
fn test_result_set_metadata() {
    let store = Arc::new(MemoryKeyValueStore::new());
    let index = open(&store, color());
    let (o1, o2, o3) = (
        car(1, Some("a"), &[]),
        car(2, Some("a"), &[]),
        car(3, Some("b"), &[]),
    );
    index.add_all(&[o1.clone(), o2.clone(), o3.clone()]).unwrap();

    let query = Query::equal(index.attribute(), "a".to_string());
    let options = QueryOptions::new().with("caller", "test");
    let result = index.retrieve(query.clone(), options).unwrap();
    assert_eq!(result.query(), &query);
    assert_eq!(result.query_options().get("caller"), Some("test"));
    assert_eq!(result.retrieval_cost(), INDEX_RETRIEVAL_COST);
    assert_eq!(result.size().unwrap(), 2);
    assert_eq!(result.merge_cost().unwrap(), 2);
    assert!(!result.is_empty().unwrap());

    assert!(result.matches(&o1));
    assert!(!result.matches(&o3));
    assert!(result.contains(&o1).unwrap());
    assert!(!result.contains(&car(9, Some("a"), &[])).unwrap());

    // Each iteration opens a new cursor, so later inserts are visible.
    let o4 = car(4, Some("a"), &[]);
    index.add_all(&[o4.clone()]).unwrap();
    assert_eq!(result.size().unwrap(), 3);

    let has = index
        .retrieve(Query::has(index.attribute()), QueryOptions::new())
        .unwrap();
    assert!(has.contains(&o3).unwrap());
    assert!(has.matches(&o3));
    assert!(!has.matches(&car(5, None, &[])));
    assert_eq!(has.merge_cost().unwrap(), 4);
}

/// `contains` tests the object content map, which is shared by every value and
/// keeps blobs after removal; `matches` is the exact check.
#[test]
fn test_contains_is_a_candidate_test() {
    let store = Arc::new(MemoryKeyValueStore::new());
    let index = open(&store, color());
    let (o1, o2, o3) = (
        car(1, Some("a"), &[]),
        car(2, Some("a"), &[]),
        car(3, Some("b"), &[]),
    );
    index.add_all(&[o1.clone(), o2.clone(), o3.clone()]).unwrap();

    let result = index
        .retrieve(
            Query::equal(index.attribute(), "a".to_string()),
            QueryOptions::new(),
        )
        .unwrap();
    assert!(result.contains(&o3).unwrap());
    assert!(!result.matches(&o3));

    index.remove_all(&[o1.clone()]).unwrap();
    assert!(result.contains(&o1).unwrap());
    assert!(result.matches(&o1));
    let ids = result
        .iter()
        .unwrap()
        .map(|c| c.unwrap().id)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![2]);

    // Compaction drops the unreferenced blob, so the candidate test follows.
    index.compact().unwrap();
    assert!(!result.contains(&o1).unwrap());
    assert!(result.contains(&o3).unwrap());
}

/// Object codec that fails for one object id.
struct FailingCarCodec {
    inner: BincodeCodec<Car>,
    fail_id: u32,
}

impl Codec<Car> for FailingCarCodec {
    fn size(&self, value: &Car) -> Result<usize> {
        if value.id == self.fail_id {
            return Err(Error::invalid_arg("car", format!("cannot encode car {}", value.id)));
        }
        self.inner.size(value)
    }

    fn serialize(&self, value: &Car, buf: &mut Vec<u8>) -> Result<()> {
        self.inner.serialize(value, buf)
    }

    fn deserialize(&self, input: &mut &[u8]) -> Result<Car> {
        self.inner.deserialize(input)
    }
}

#[test]
fn test_failed_add_all_keeps_applied_pairs() {
    let store = Arc::new(MemoryKeyValueStore::new());
    let dyn_store: Arc<dyn KeyValueStore> = store.clone();
    let registry = CodecRegistry::new();
    let index = HashIndexOptions::new(dyn_store)
        .open_with_codecs(
            color(),
            registry.resolve::<String>().unwrap(),
            Arc::new(FailingCarCodec {
                inner: BincodeCodec::new(),
                fail_id: 2,
            }),
        )
        .unwrap();

    let (o1, o2, o3) = (
        car(1, Some("a"), &[]),
        car(2, Some("a"), &[]),
        car(3, Some("a"), &[]),
    );
    assert!(index.add_all(&[o1.clone(), o2, o3]).is_err());

    // The pair written before the failure stays; nothing after it was applied.
    assert_eq!(exact(&index, "a"), vec![o1.clone()]);
    assert_eq!(
        index.count_for_key(&"a".into(), &QueryOptions::new()).unwrap(),
        1
    );
    assert_eq!(map_len(&store, "index_color"), 1);
    assert_eq!(map_len(&store, "index_objhash_color"), 1);

    // Content blobs are written before the association, so a failed association
    // write leaves blobs behind but never a dangling association.
    store
        .get_map("index_color")
        .unwrap()
        .unwrap()
        .set_read_only(true);
    let o4 = car(4, Some("d"), &[]);
    assert!(index.add_all(&[o4]).is_err());
    assert_eq!(map_len(&store, "index_color"), 1);
    assert_eq!(map_len(&store, "index_objhash_color"), 2);
    assert_eq!(map_len(&store, "index_attrhash_color"), 2);
    assert!(exact(&index, "d").is_empty());
    assert_eq!(exact(&index, "a"), vec![o1]);
}

#[test]
fn test_attribute_names_need_not_be_file_safe() {
    let store = Arc::new(MemoryKeyValueStore::new());
    let dyn_store: Arc<dyn KeyValueStore> = store.clone();
    let total = attribute::single("order:total", |v: &u64| Some(*v));
    let index = HashIndexOptions::new(dyn_store).open(total).unwrap();
    assert_eq!(
        index.map_names(),
        [
            "index_order:total",
            "index_attrhash_order:total",
            "index_objhash_order:total"
        ]
    );

    index.add_all(&[10, 20, 20]).unwrap();
    let found = index
        .retrieve(Query::equal(index.attribute(), 20), QueryOptions::new())
        .unwrap()
        .iter()
        .unwrap()
        .map(|v| v.unwrap())
        .collect::<Vec<_>>();
    assert_eq!(found, vec![20]);
    assert_eq!(map_len(&store, "index_order:total"), 2);
}

#[test]
fn test_unsupported_queries_fail_fast() {
    let store = Arc::new(MemoryKeyValueStore::new());
    let index = open(&store, color());
    assert!(index.capabilities().supports(QueryKind::Equal));
    assert!(index.capabilities().supports(QueryKind::Has));

    let queries = vec![
        Query::in_values(index.attribute(), vec!["a".into(), "b".into()]),
        Query::LessThan {
            attribute: "color".into(),
            value: "m".into(),
            inclusive: false,
        },
        Query::GreaterThan {
            attribute: "color".into(),
            value: "m".into(),
            inclusive: true,
        },
        Query::Between {
            attribute: "color".into(),
            lower: "a".into(),
            lower_inclusive: true,
            upper: "z".into(),
            upper_inclusive: true,
        },
    ];
    for query in queries {
        assert!(!index.capabilities().supports(query.kind()));
        let text = query.to_string();
        let err = match index.retrieve(query, QueryOptions::new()) {
            Ok(_) => panic!("{text} must be rejected"),
            Err(err) => err,
        };
        assert!(err.is_unsupported_query());
        match err.kind() {
            ErrorKind::UnsupportedQuery { query } => assert_eq!(query, &text),
            other => panic!("unexpected error {other}"),
        }
    }

    let foreign = Query::Equal {
        attribute: "model".to_string(),
        value: "x".to_string(),
    };
    assert!(index.retrieve(foreign, QueryOptions::new()).is_err());
}

#[test]
fn test_mutability_flags() {
    let store = Arc::new(MemoryKeyValueStore::new());
    let index = open(&store, color());
    assert!(index.is_mutable());
    assert!(!index.is_quantized());
    index.add_all(&[car(1, Some("a"), &[])]).unwrap();

    store.set_read_only(true).unwrap();
    assert!(!index.is_mutable());
    assert!(index.add_all(&[car(2, Some("a"), &[])]).is_err());
    assert_eq!(exact(&index, "a").len(), 1);
}

#[test]
fn test_construction_requires_codecs() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());

    // `Car` has no registered codec, and `open` does not fall back.
    let err = match HashIndexOptions::new(store.clone()).open(color()) {
        Ok(_) => panic!("Car has no codec"),
        Err(err) => err,
    };
    assert!(matches!(err.kind(), ErrorKind::UnsupportedType { .. }));

    #[derive(Debug, PartialEq, PartialOrd)]
    struct Opaque(u8);
    let opaque = attribute::single("opaque", |c: &Car| Some(Opaque(c.id as u8)));
    let err = match HashIndexOptions::new(store).open_structural(opaque) {
        Ok(_) => panic!("Opaque has no codec"),
        Err(err) => err,
    };
    assert!(matches!(err.kind(), ErrorKind::UnsupportedType { .. }));
}

#[derive(Debug, Clone, PartialEq)]
struct Driver {
    name: String,
    license: u64,
}

#[test]
fn test_layout_object_codec() {
    let registry = Arc::new(CodecRegistry::new());
    let layout = Layout::builder("Driver", &registry)
        .field("name", |d: &Driver| &d.name)
        .field("license", |d: &Driver| &d.license)
        .build(|v| {
            Ok(Driver {
                name: v.take("name")?,
                license: v.take("license")?,
            })
        })
        .unwrap();
    registry.register::<Driver>(Arc::new(layout)).unwrap();

    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
    let index = HashIndexOptions::new(store)
        .codecs(registry)
        .open(attribute::single("license", |d: &Driver| Some(d.license)))
        .unwrap();
    let drivers = vec![
        Driver {
            name: "ann".into(),
            license: 10,
        },
        Driver {
            name: "bob".into(),
            license: 20,
        },
    ];
    index.add_all(&drivers).unwrap();
    let found = index
        .retrieve(Query::equal(index.attribute(), 20), QueryOptions::new())
        .unwrap()
        .iter()
        .unwrap()
        .map(|d| d.unwrap())
        .collect::<Vec<_>>();
    assert_eq!(found, vec![drivers[1].clone()]);
}

#[test]
fn test_hash_algorithm_sets_key_width() {
    for (alg, width) in [
        (HashAlgorithm::Sha224, 28),
        (HashAlgorithm::Sha256, 32),
        (HashAlgorithm::Sha384, 48),
        (HashAlgorithm::Sha512, 64),
    ] {
        let store = Arc::new(MemoryKeyValueStore::new());
        let dyn_store: Arc<dyn KeyValueStore> = store.clone();
        let index = HashIndexOptions::new(dyn_store)
            .hash_algorithm(alg)
            .open_structural(color())
            .unwrap();
        assert_eq!(index.hash_size(), width);
        index.add_all(&[car(1, Some("a"), &[])]).unwrap();
        let key = store
            .open_map("index_color")
            .unwrap()
            .first_key()
            .unwrap()
            .unwrap();
        assert_eq!(key.len(), 2 * width);
        assert_eq!(exact(&index, "a").len(), 1);
    }
}

#[test]
fn test_retrieval_cost_option() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
    let index = HashIndexOptions::new(store)
        .retrieval_cost(7)
        .open_structural(color())
        .unwrap();
    assert_eq!(index.capabilities().retrieval_cost, 7);
    let result = index
        .retrieve(Query::has(index.attribute()), QueryOptions::new())
        .unwrap();
    assert_eq!(result.retrieval_cost(), 7);
}

#[test]
fn test_compaction_removes_unreferenced_blobs() {
    let store = Arc::new(MemoryKeyValueStore::new());
    let index = open(&store, color());
    let (o1, o2, o3) = (
        car(1, Some("a"), &[]),
        car(2, Some("a"), &[]),
        car(3, Some("b"), &[]),
    );
    index.add_all(&[o1.clone(), o2.clone(), o3.clone()]).unwrap();
    index.remove_all(&[o1, o3]).unwrap();

    let stats = index.compact().unwrap();
    assert_eq!(stats.associations, 1);
    assert_eq!(stats.attributes_retained, 1);
    assert_eq!(stats.attributes_removed, 1);
    assert_eq!(stats.objects_retained, 1);
    assert_eq!(stats.objects_removed, 2);

    let options = QueryOptions::new();
    assert_eq!(index.count_of_distinct_keys(&options).unwrap(), 1);
    assert_eq!(exact(&index, "a"), vec![o2]);

    let again = index.compact().unwrap();
    assert_eq!(again.attributes_removed + again.objects_removed, 0);
}

#[test]
fn test_index_type_registration() {
    let registry = IndexTypeRegistry::new();
    let index_type: Arc<dyn IndexType> = HashIndexType::new();
    registry.add(index_type).unwrap();
    let found = registry.get(HashIndexType::NAME).unwrap();
    assert_eq!(found.name(), "hash-index");
    assert!(found.capabilities().supports(QueryKind::Equal));
    assert!(found.capabilities().supports(QueryKind::Has));
    assert!(!found.capabilities().supports(QueryKind::Between));
    assert_eq!(found.capabilities().retrieval_cost, INDEX_RETRIEVAL_COST);
}
