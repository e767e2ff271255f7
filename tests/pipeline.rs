use std::fs::{self, File};
use std::path::Path;

use spacenet_prep::dataset::{list_rasters, Split};
use spacenet_prep::merge::MERGED_INDEX_NAME;
use spacenet_prep::record::read_index;
use spacenet_prep::{pipeline, AnnotationSource, CityConfig, ParseMode, PipelineConfig, TiffReader};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

/// 4x4 RGB16 GeoTIFF with origin (10, 20) and 0.5 unit pixels.
fn write_geotiff(path: &Path) {
    let mut encoder = TiffEncoder::new(File::create(path).unwrap()).unwrap();
    let mut image = encoder.new_image::<colortype::RGB16>(4, 4).unwrap();
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &[0.5f64, 0.5, 0.0][..])
        .unwrap();
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &[0.0f64, 0.0, 0.0, 10.0, 20.0, 0.0][..])
        .unwrap();
    let data: Vec<u16> = (0..48).map(|v| v * 40).collect();
    image.write_data(&data).unwrap();
}

struct Fixture {
    _dir: tempfile::TempDir,
    config: PipelineConfig,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().expect("create temp dir");
    let root = dir.path();

    let rio_images = root.join("AOI_1_Rio_Train/RGB-PanSharpen");
    let rio_geojson = root.join("AOI_1_Rio_Train/geojson");
    fs::create_dir_all(&rio_images).unwrap();
    fs::create_dir_all(&rio_geojson).unwrap();
    for i in 1..=5 {
        write_geotiff(&rio_images.join(format!("RGB-PanSharpen_AOI_1_Rio_img{i}.tif")));
    }
    let building = r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{},
        "geometry":{"type":"Polygon","coordinates":[[[10.0,20.0,0.0],[11.0,20.0,0.0],
        [11.0,19.0,0.0],[10.0,20.0,0.0]]]}}]}"#;
    for i in 1..=4 {
        let body = if i % 2 == 1 {
            building
        } else {
            r#"{"type":"FeatureCollection","features":[]}"#
        };
        fs::write(rio_geojson.join(format!("Geo_AOI_1_RIO_img{i}.geojson")), body).unwrap();
    }
    // img5 has no sidecar.

    let vegas_images = root.join("AOI_2_Vegas_Train/RGB-PanSharpen");
    fs::create_dir_all(&vegas_images).unwrap();
    for i in 1..=5 {
        write_geotiff(&vegas_images.join(format!("RGB-PanSharpen_AOI_2_Vegas_img{i}.tif")));
    }
    let csv = root.join("AOI_2_Vegas_Train/buildings.csv");
    fs::write(
        &csv,
        "ImageId,BuildingId,PolygonWKT_Pix,PolygonWKT_Geo\n\
         AOI_2_Vegas_img1,1,\"POLYGON ((0 0 0,3 0 0,3 3 0,0 0 0))\",x\n\
         AOI_2_Vegas_img1,2,\"POLYGON ((1 1 0,2 1 0,2 2 0,1 1 0))\",x\n\
         AOI_2_Vegas_img2,-1,POLYGON EMPTY,POLYGON EMPTY\n\
         AOI_2_Vegas_img3,1,\"POLYGON ((0 0 0,1 0 0,1 1 0,0 0 0))\",x\n\
         AOI_2_Vegas_img3,2,POLYGON EMPTY,POLYGON EMPTY\n\
         AOI_2_Vegas_img3,3,\"POLYGON ((2 2 0,3 2 0,3 3 0,2 2 0))\",x\n",
    )
    .unwrap();

    let config = PipelineConfig {
        output_root: root.join("out"),
        seed: 560,
        val_fraction: 0.2,
        parse_mode: ParseMode::Strict,
        cities: vec![
            CityConfig {
                id: 1,
                name: "Rio".into(),
                image_dir: rio_images,
                test_dir: None,
                normalize: false,
                annotations: AnnotationSource::GeoJson {
                    dir: rio_geojson,
                    template: "Geo_AOI_1_RIO_img{id}.geojson".into(),
                },
            },
            CityConfig {
                id: 2,
                name: "Vegas".into(),
                image_dir: vegas_images,
                test_dir: None,
                normalize: true,
                annotations: AnnotationSource::Tabular { csv },
            },
        ],
    };
    config.validate().unwrap();
    Fixture { _dir: dir, config }
}

#[test]
fn annotate_writes_city_and_merged_indexes() {
    let fx = fixture();
    let merged = pipeline::annotate(&fx.config, &TiffReader).unwrap();
    let out = &fx.config.output_root;
    assert_eq!(merged, vec![out.join("train").join(MERGED_INDEX_NAME), out.join("val").join(MERGED_INDEX_NAME)]);

    for split in [Split::Train, Split::Val] {
        let rio = read_index(&split.dir(out).join("AOI_1_Rio_region_data.json")).unwrap();
        let vegas = read_index(&split.dir(out).join("AOI_2_Vegas_region_data.json")).unwrap();
        let all = read_index(&split.dir(out).join(MERGED_INDEX_NAME)).unwrap();
        assert_eq!(all.len(), rio.len() + vegas.len());
        // 5 rasters per city: 4 train, 1 val.
        let expected = if split == Split::Train { 4 } else { 1 };
        assert_eq!(rio.len(), expected);
        assert_eq!(vegas.len(), expected);
    }

    let train = read_index(&out.join("train").join(MERGED_INDEX_NAME)).unwrap();
    let val = read_index(&out.join("val").join(MERGED_INDEX_NAME)).unwrap();
    let mut all = train;
    all.extend(val);
    assert_eq!(all.len(), 10);

    let rio1 = &all["RGB-PanSharpen_AOI_1_Rio_img1.png"];
    assert_eq!(rio1.regions.len(), 1);
    assert_eq!(rio1.regions[0].shape_attributes.all_points_x, vec![0, 2, 2, 0]);
    assert_eq!(rio1.regions[0].shape_attributes.all_points_y, vec![0, 0, 2, 0]);
    assert!(all["RGB-PanSharpen_AOI_1_Rio_img2.png"].regions.is_empty());
    assert!(all["RGB-PanSharpen_AOI_1_Rio_img5.png"].regions.is_empty());

    assert_eq!(all["RGB-PanSharpen_AOI_2_Vegas_img1.png"].regions.len(), 2);
    assert!(all["RGB-PanSharpen_AOI_2_Vegas_img2.png"].regions.is_empty());
    assert!(all["RGB-PanSharpen_AOI_2_Vegas_img3.png"].regions.is_empty());
    assert!(all["RGB-PanSharpen_AOI_2_Vegas_img4.png"].regions.is_empty());

    let size = fs::metadata(fx.config.cities[0].image_dir.join("RGB-PanSharpen_AOI_1_Rio_img1.tif"))
        .unwrap()
        .len();
    assert_eq!(rio1.size, size);
}

#[test]
fn every_record_has_the_full_schema() {
    let fx = fixture();
    pipeline::annotate(&fx.config, &TiffReader).unwrap();

    let text = fs::read_to_string(fx.config.output_root.join("train").join(MERGED_INDEX_NAME)).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    for (key, record) in value.as_object().unwrap() {
        let record = record.as_object().unwrap();
        assert_eq!(record["filename"], serde_json::json!(key));
        for field in ["file_ref", "size", "filename", "base64_img_data", "file_attributes", "regions"] {
            assert!(record.contains_key(field), "{key} lacks {field}");
        }
        let regions = record["regions"].as_object().unwrap();
        for i in 0..regions.len() {
            assert!(regions.contains_key(&i.to_string()), "{key} lacks region {i}");
        }
    }
}

#[test]
fn annotate_is_idempotent() {
    let fx = fixture();
    pipeline::annotate(&fx.config, &TiffReader).unwrap();
    let merged = fx.config.output_root.join("train").join(MERGED_INDEX_NAME);
    let city = fx.config.output_root.join("val").join("AOI_2_Vegas_region_data.json");
    let first = (fs::read(&merged).unwrap(), fs::read(&city).unwrap());

    pipeline::annotate(&fx.config, &TiffReader).unwrap();
    let second = (fs::read(&merged).unwrap(), fs::read(&city).unwrap());
    assert_eq!(first, second);
}

#[test]
fn merge_alone_rebuilds_the_split_index() {
    let fx = fixture();
    pipeline::annotate(&fx.config, &TiffReader).unwrap();
    let merged = fx.config.output_root.join("val").join(MERGED_INDEX_NAME);
    let before = fs::read(&merged).unwrap();
    fs::remove_file(&merged).unwrap();

    let path = pipeline::merge(&fx.config, Split::Val).unwrap();
    assert_eq!(path, merged);
    assert_eq!(fs::read(&merged).unwrap(), before);
}

#[test]
fn convert_writes_pngs_for_the_same_split() {
    let fx = fixture();
    let count = pipeline::convert(&fx.config, &TiffReader).unwrap();
    assert_eq!(count, 10);
    pipeline::annotate(&fx.config, &TiffReader).unwrap();

    for split in [Split::Train, Split::Val] {
        let dir = split.dir(&fx.config.output_root);
        let mut pngs = list_rasters(&dir, "png").unwrap();
        let mut keys: Vec<String> = read_index(&dir.join(MERGED_INDEX_NAME))
            .unwrap()
            .into_keys()
            .collect();
        pngs.sort();
        keys.sort();
        assert_eq!(pngs, keys);
    }

    let train_dir = Split::Train.dir(&fx.config.output_root);
    let any_png = list_rasters(&train_dir, "png").unwrap().remove(0);
    let img = image::open(train_dir.join(any_png)).unwrap().to_rgb8();
    assert_eq!(img.dimensions(), (4, 4));
}
