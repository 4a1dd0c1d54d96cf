mod tests_block_cache;
