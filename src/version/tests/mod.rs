mod tests_candidates;
mod tests_load_from_dir;
