use std::cell::RefCell;
use std::rc::Rc;

use super::*;

type Log = Rc<RefCell<Vec<String>>>;

fn engine() -> (MemoryEngine, Log, Log) {
    let e = MemoryEngine::new();
    let notices: Log = Rc::default();
    let errors: Log = Rc::default();
    let (n, r) = (notices.clone(), errors.clone());
    let status = e.set_handlers(
        Box::new(move |m| n.borrow_mut().push(m.to_string())),
        Box::new(move |m| r.borrow_mut().push(m.to_string())),
    );
    assert_eq!(status, STATUS_OK);
    (e, notices, errors)
}

fn read(e: &MemoryEngine, text: &str) -> RawHandle {
    let r = e.wkt_reader_create().unwrap();
    let g = e.wkt_reader_read(r, text).unwrap();
    e.wkt_reader_destroy(r);
    g
}

fn wkt(e: &MemoryEngine, g: RawHandle) -> String {
    e.wkt_write(g).unwrap()
}

#[test]
fn wkt_normalizes_on_write() {
    let (e, _, errors) = engine();
    let cases = [
        ("point(1 2)", "POINT (1 2)"),
        ("POINT Z (1 2 3)", "POINT Z (1 2 3)"),
        ("POINT (1 2 3)", "POINT Z (1 2 3)"),
        ("MULTIPOINT (0 0, 1 1)", "MULTIPOINT ((0 0), (1 1))"),
        ("polygon empty", "POLYGON EMPTY"),
        ("LINESTRING(0 0,1 1,2 0.5)", "LINESTRING (0 0, 1 1, 2 0.5)"),
        (
            "GEOMETRYCOLLECTION(POINT(1 1),LINESTRING EMPTY)",
            "GEOMETRYCOLLECTION (POINT (1 1), LINESTRING EMPTY)",
        ),
        (
            "POLYGON((0 0,4 0,4 4,0 4,0 0),(1 1,2 1,2 2,1 1))",
            "POLYGON ((0 0, 4 0, 4 4, 0 4, 0 0), (1 1, 2 1, 2 2, 1 1))",
        ),
    ];
    for (input, want) in cases {
        let g = read(&e, input);
        assert_eq!(wkt(&e, g), want, "input {input}");
        e.geom_destroy(g);
    }
    assert!(errors.borrow().is_empty());
    assert_eq!(e.live_handles(), 0);
}

#[test]
fn malformed_wkt_raises_through_callback() {
    let (e, _, errors) = engine();
    let r = e.wkt_reader_create().unwrap();
    for bad in ["POINT (1)", "LINESTRING (0 0)", "POLYGON ((0 0, 1 0, 1 1))", "POINT M (1 2 3)", "CIRCLE (1 2)"] {
        assert_eq!(e.wkt_reader_read(r, bad), None, "input {bad}");
    }
    assert_eq!(errors.borrow().len(), 5);
    assert!(errors.borrow()[4].contains("Unknown type"));
    e.wkt_reader_destroy(r);
}

#[test]
fn sentinels_for_wrong_geometry_kind() {
    let (e, _, errors) = engine();
    let p = read(&e, "POINT (1 2)");
    assert_eq!(e.num_interior_rings(p), -1);
    assert_eq!(e.is_closed(p), PRED_UNKNOWN);
    assert_eq!(e.num_points(p), -1);
    assert_eq!(e.get_x(p), Some(1.0));
    let l = read(&e, "LINESTRING (0 0, 1 1)");
    assert_eq!(e.get_x(l), None);
    assert_eq!(errors.borrow().len(), 4);
    e.geom_destroy(p);
    e.geom_destroy(l);
}

#[test]
fn views_die_with_their_root() {
    let (e, notices, _) = engine();
    let g = read(&e, "MULTIPOINT ((0 0), (1 1))");
    let c0 = e.geometry_n(g, 0).unwrap();
    assert_eq!(e.geometry_n(g, 0), Some(c0), "views are deduplicated");
    let c1 = e.geometry_n(g, 1).unwrap();
    assert_eq!(e.live_views(), 2);

    // Borrowed handles cannot be destroyed directly.
    e.geom_destroy(c0);
    assert_eq!(notices.borrow().len(), 1);
    assert_eq!(e.get_x(c1), Some(1.0));

    e.geom_destroy(g);
    assert_eq!(e.live_views(), 0);
    assert_eq!(e.live_handles(), 0);
    assert_eq!(e.geom_type_id(c1), -1);
}

#[test]
fn clone_of_view_is_owned() {
    let (e, _, _) = engine();
    let poly = read(&e, "POLYGON ((0 0, 4 0, 4 4, 0 4, 0 0), (1 1, 2 1, 2 2, 1 1))");
    let hole = e.interior_ring_n(poly, 0).unwrap();
    let owned = e.geom_clone(hole).unwrap();
    e.geom_destroy(poly);
    assert_eq!(wkt(&e, owned), "LINEARRING (1 1, 2 1, 2 2, 1 1)");
    assert_eq!(e.is_ring(owned), PRED_TRUE);
    e.geom_destroy(owned);
    assert_eq!(e.live_handles(), 0);
}

#[test]
fn simple_geometry_is_its_own_only_child() {
    let (e, _, errors) = engine();
    let p = read(&e, "POINT (3 4)");
    assert_eq!(e.num_geometries(p), 1);
    let c = e.geometry_n(p, 0).unwrap();
    assert_eq!(e.equals_exact(p, c, 0.0), PRED_TRUE);
    assert_eq!(e.geometry_n(p, 1), None);
    assert_eq!(errors.borrow().len(), 1);
    e.geom_destroy(p);
}

#[test]
fn wkb_writer_settings() {
    let (e, _, errors) = engine();
    let w = e.wkb_writer_create().unwrap();
    assert_eq!(e.wkb_writer_get_output_dimension(w), 2);
    assert_eq!(e.wkb_writer_get_byte_order(w), 1);
    assert_eq!(e.wkb_writer_get_include_srid(w), PRED_FALSE);
    assert_eq!(e.wkb_writer_set_output_dimension(w, 4), STATUS_FAIL);
    assert_eq!(e.wkb_writer_set_byte_order(w, 7), STATUS_FAIL);
    assert_eq!(errors.borrow().len(), 2);

    let g = read(&e, "POINT (1 2)");
    let hex = e.wkb_writer_write_hex(w, g).unwrap();
    assert_eq!(hex, "0101000000000000000000F03F0000000000000040");

    assert_eq!(e.wkb_writer_set_byte_order(w, 0), STATUS_OK);
    let hex = e.wkb_writer_write_hex(w, g).unwrap();
    assert_eq!(hex, "00000000013FF00000000000004000000000000000");
    e.wkb_writer_destroy(w);
    e.geom_destroy(g);
}

#[test]
fn ewkb_carries_srid_and_z_on_top_level_only() {
    let (e, _, _) = engine();
    let w = e.wkb_writer_create().unwrap();
    e.wkb_writer_set_output_dimension(w, 3);
    e.wkb_writer_set_include_srid(w, true);
    let g = read(&e, "MULTIPOINT Z ((1 2 3))");
    e.set_srid(g, 4326);
    let bytes = e.wkb_writer_write(w, g).unwrap();
    // 0xA0000004 = Z | SRID | MultiPoint
    assert_eq!(&bytes[1..5], &[0x04, 0x00, 0x00, 0xA0]);
    assert_eq!(&bytes[5..9], &4326u32.to_le_bytes());
    // member: Z flag only
    assert_eq!(&bytes[14..18], &[0x01, 0x00, 0x00, 0x80]);

    let r = e.wkb_reader_create().unwrap();
    let back = e.wkb_reader_read(r, &bytes).unwrap();
    assert_eq!(e.get_srid(back), Some(4326));
    assert_eq!(wkt(&e, back), "MULTIPOINT Z ((1 2 3))");
    let lower = hex::encode(&bytes);
    let again = e.wkb_reader_read_hex(r, lower.as_bytes()).unwrap();
    assert_eq!(e.equals_exact(back, again, 0.0), PRED_TRUE);
    for h in [g, back, again] {
        e.geom_destroy(h);
    }
    e.wkb_reader_destroy(r);
    e.wkb_writer_destroy(w);
    assert_eq!(e.live_handles(), 0);
}

#[test]
fn wkb_reader_rejects_garbage() {
    let (e, _, errors) = engine();
    let r = e.wkb_reader_create().unwrap();
    assert_eq!(e.wkb_reader_read(r, &[0x01, 0x01, 0x00]), None);
    assert_eq!(e.wkb_reader_read(r, &[0x07]), None);
    assert_eq!(e.wkb_reader_read_hex(r, b"zz"), None);
    assert_eq!(errors.borrow().len(), 3);
    e.wkb_reader_destroy(r);
}

#[test]
fn destroy_with_wrong_kind_is_refused() {
    let (e, notices, _) = engine();
    let w = e.wkb_writer_create().unwrap();
    e.geom_destroy(w);
    assert_eq!(e.live_handles(), 1);
    assert_eq!(notices.borrow().len(), 1);
    e.wkb_writer_destroy(w);
    e.wkb_writer_destroy(w);
    assert_eq!(notices.borrow().len(), 2);
    assert_eq!(e.live_handles(), 0);
}

#[test]
fn buffer_params_validate_codes() {
    let (e, _, errors) = engine();
    let p = e.buffer_params_create().unwrap();
    assert_eq!(e.buffer_params(p), Some(BufferParamsData::default()));
    assert_eq!(e.buffer_params_set_end_cap_style(p, 9), STATUS_FAIL);
    assert_eq!(e.buffer_params_set_join_style(p, 0), STATUS_FAIL);
    assert_eq!(e.buffer_params_set_quadrant_segments(p, i32::MAX), STATUS_FAIL);
    assert_eq!(errors.borrow().len(), 3);
    assert!(errors.borrow()[2].contains("quadrant segments"));
    assert_eq!(e.buffer_params(p).map(|d| d.quadrant_segments), Some(8));
    assert_eq!(e.buffer_params_set_join_style(p, 2), STATUS_OK);
    assert_eq!(e.buffer_params(p).map(|d| d.join_style), Some(2));
    e.buffer_params_destroy(p);
    assert_eq!(e.buffer_params(p), None);
}

#[test]
fn point_buffer_is_regular_polygon() {
    let (e, _, _) = engine();
    let p = e.buffer_params_create().unwrap();
    e.buffer_params_set_quadrant_segments(p, 2);
    let g = read(&e, "POINT (0 0)");
    let b = e.buffer_with_params(g, p, 1.0).unwrap();
    assert_eq!(e.geom_type_id(b), geom::TYPE_POLYGON);
    let ring = e.exterior_ring(b).unwrap();
    assert_eq!(e.num_points(ring), 9);
    let area = e.area(b).unwrap();
    assert!((area - 2.0 * 2f64.sqrt()).abs() < 1e-9, "octagon area {area}");
    for h in [g, b] {
        e.geom_destroy(h);
    }
    e.buffer_params_destroy(p);
}

#[test]
fn polygonize_classifies_chains() {
    let (e, _, _) = engine();
    let g = read(
        &e,
        "MULTILINESTRING ((0 0, 1 0), (1 0, 1 1), (1 1, 0 1), (0 1, 0 0), (1 1, 2 2))",
    );
    let out = e.polygonize_full(g).unwrap();
    assert_eq!(e.num_geometries(out.rings), 1);
    assert_eq!(e.num_geometries(out.dangles), 1);
    assert_eq!(e.num_geometries(out.cut_edges), 0);
    assert_eq!(e.num_geometries(out.invalid_rings), 0);
    let ring = e.geometry_n(out.rings, 0).unwrap();
    assert_eq!(e.area(ring), Some(1.0));
    for h in [g, out.rings, out.cut_edges, out.dangles, out.invalid_rings] {
        e.geom_destroy(h);
    }
    assert_eq!(e.live_handles(), 0);
}

#[test]
fn line_merge_joins_through_degree_two_nodes() {
    let (e, _, _) = engine();
    let g = read(&e, "MULTILINESTRING ((0 0, 1 0), (1 0, 2 0), (5 5, 6 6))");
    let merged = e.line_merge(g).unwrap();
    assert_eq!(
        wkt(&e, merged),
        "MULTILINESTRING ((0 0, 1 0, 2 0), (5 5, 6 6))"
    );
    e.geom_destroy(merged);
    e.geom_destroy(g);
}

#[test]
fn shared_paths_split_by_direction() {
    let (e, _, errors) = engine();
    let a = read(&e, "LINESTRING (0 0, 1 0, 2 0, 3 0)");
    let b = read(&e, "MULTILINESTRING ((0 0, 1 0, 2 0), (3 0, 2 0))");
    let out = e.shared_paths(a, b).unwrap();
    assert_eq!(
        wkt(&e, out),
        "GEOMETRYCOLLECTION (MULTILINESTRING ((0 0, 1 0, 2 0)), MULTILINESTRING ((2 0, 3 0)))"
    );
    let p = read(&e, "POINT (0 0)");
    assert_eq!(e.shared_paths(a, p), None);
    assert!(errors.borrow()[0].contains("not lineal"));
    for h in [a, b, out, p] {
        e.geom_destroy(h);
    }
}

#[test]
fn relate_patterns() {
    let (e, _, errors) = engine();
    assert_eq!(e.relate_pattern_match("212101212", "T*F**F***"), PRED_FALSE);
    assert_eq!(e.relate_pattern_match("2FF1FF212", "T*F**F***"), PRED_TRUE);
    assert_eq!(e.relate_pattern_match("212", "T*F**F***"), PRED_UNKNOWN);
    assert_eq!(errors.borrow().len(), 1);
}

#[test]
fn envelope_shapes() {
    let (e, _, _) = engine();
    let l = read(&e, "LINESTRING (0 0, 2 1)");
    let env = e.envelope(l).unwrap();
    assert_eq!(wkt(&e, env), "POLYGON ((0 0, 2 0, 2 1, 0 1, 0 0))");
    let p = read(&e, "POINT (1 1)");
    let penv = e.envelope(p).unwrap();
    assert_eq!(wkt(&e, penv), "POINT (1 1)");
    for h in [l, env, p, penv] {
        e.geom_destroy(h);
    }
}

#[test]
fn messages_are_dropped_without_handlers() {
    let e = MemoryEngine::new();
    let r = e.wkt_reader_create().unwrap();
    assert_eq!(e.wkt_reader_read(r, "nonsense"), None);
    e.wkt_reader_destroy(r);
    assert_eq!(e.live_handles(), 0);
}

#[test]
fn second_handler_pair_is_refused() {
    let (e, _n, errors) = engine();
    let stray: Log = Rc::default();
    let sink = stray.clone();
    let status = e.set_handlers(Box::new(|_| {}), Box::new(move |m| sink.borrow_mut().push(m.to_string())));
    assert_eq!(status, STATUS_FAIL);
    let r = e.wkt_reader_create().unwrap();
    assert!(e.wkt_reader_read(r, "CIRCLE (1 2)").is_none());
    assert_eq!(errors.borrow().len(), 1);
    assert!(stray.borrow().is_empty());

    e.clear_handlers();
    assert_eq!(e.set_handlers(Box::new(|_| {}), Box::new(|_| {})), STATUS_OK);
}
